// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::io::{Read, Write};
use crate::input::FillSource;
use crate::output::FlushSink;

/// A wrapper implementing [`FillSource`] for any [`Read`].
#[derive(Debug)]
pub struct ReadSource<R: Read>(pub R);

impl<R: Read> From<R> for ReadSource<R> {
	fn from(value: R) -> Self {
		Self(value)
	}
}

impl<R: Read> FillSource for ReadSource<R> {
	fn fill(&mut self, dst: &mut [u8]) -> io::Result<usize> {
		let Self(reader) = self;
		reader.read(dst)
	}
}

/// A wrapper implementing [`FlushSink`] for any [`Write`].
#[derive(Debug)]
pub struct WriteSink<W: Write>(pub W);

impl<W: Write> From<W> for WriteSink<W> {
	fn from(value: W) -> Self {
		Self(value)
	}
}

impl<W: Write> FlushSink for WriteSink<W> {
	fn flush(&mut self, data: &[u8]) -> io::Result<()> {
		let Self(writer) = self;
		writer.write_all(data)
	}

	fn close_sink(&mut self) -> io::Result<()> {
		self.0.flush()
	}
}
