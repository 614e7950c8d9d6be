// SPDX-License-Identifier: Apache-2.0

use std::io;
use crate::input::FillSource;
use crate::output::FlushSink;

/// A [`FillSource`] that reads from nowhere, producing no data. Backs packet
/// readers, which only ever replay their seeded chunks.
#[derive(Copy, Clone, Debug, Default)]
pub struct VoidSource;

impl FillSource for VoidSource {
	/// Fills nothing, returning `0`.
	fn fill(&mut self, _dst: &mut [u8]) -> io::Result<usize> {
		Ok(0)
	}
}

/// A [`FlushSink`] that writes to nowhere, dropping any data flushed to it.
/// Backs packet builders, where [`build`](crate::Output::build) is the
/// operation that preserves bytes.
#[derive(Copy, Clone, Debug, Default)]
pub struct VoidSink;

impl FlushSink for VoidSink {
	/// Drops `data`.
	fn flush(&mut self, _data: &[u8]) -> io::Result<()> {
		Ok(())
	}
}
