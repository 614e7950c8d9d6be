// SPDX-License-Identifier: Apache-2.0

use std::{fmt, io, result};

/// The result type for chunk IO operations.
pub type Result<T = (), E = Error> = result::Result<T, E>;

/// The error type for [`Input`], [`Output`] and [`Packet`] operations.
///
/// [`Input`]: crate::Input
/// [`Output`]: crate::Output
/// [`Packet`]: crate::Packet
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct Error {
	pub context: Context,
	pub source: ErrorKind,
}

/// The failure encountered.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
	/// The source ended before the requested byte count was satisfied.
	#[error(transparent)]
	End(#[from] EndOfInput),
	/// The instance was already closed.
	#[error("instance closed")]
	Closed,
	/// Invalid UTF-8 was decoded.
	#[error("invalid UTF-8: {0}")]
	Utf8(simdutf8::basic::Utf8Error),
	/// An IO error raised by a fill source or flush sink.
	#[error(transparent)]
	Io(io::Error),
}

/// A premature end-of-input error.
#[derive(Copy, Clone, Debug, Default, thiserror::Error)]
#[error("premature end of input{}", self.format_req())]
pub struct EndOfInput {
	/// The number of bytes required by the failed operation.
	pub required_count: Option<usize>,
}

impl EndOfInput {
	fn format_req(&self) -> String {
		self.required_count.map_or_else(
			Default::default,
			|n| format!(" (required {n} bytes)")
		)
	}
}

impl From<usize> for EndOfInput {
	fn from(value: usize) -> Self {
		Self { required_count: Some(value) }
	}
}

/// The operation attempted when the error was encountered.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Context {
	/// Reading bytes or primitives.
	Read,
	/// Filling from the source.
	Fill,
	/// Pulling chunks ahead of the cursor.
	Prefetch,
	/// Opening a preview session.
	Preview,
	/// Discarding bytes.
	Discard,
	/// Writing bytes or primitives.
	Write,
	/// Flushing to the sink.
	Flush,
	/// Closing the instance.
	Close,
	/// Other operation described with a string.
	Other(&'static str),
}

impl Error {
	pub fn new(context: Context, source: ErrorKind) -> Self {
		Self { context, source }
	}

	pub fn closed(context: Context) -> Self {
		Self::new(context, ErrorKind::Closed)
	}

	pub fn end_of_input(required_count: usize, context: Context) -> Self {
		Self::new(context, ErrorKind::End(required_count.into()))
	}

	/// Returns `true` if the error is a premature end-of-input.
	pub fn is_end_of_input(&self) -> bool {
		matches!(self.source, ErrorKind::End(_))
	}

	/// Returns `true` if the error is a closed-instance violation.
	pub fn is_closed(&self) -> bool {
		matches!(self.source, ErrorKind::Closed)
	}
}

impl From<io::Error> for ErrorKind {
	fn from(value: io::Error) -> Self {
		if let io::ErrorKind::UnexpectedEof = value.kind() {
			Self::End(EndOfInput::default())
		} else {
			Self::Io(value)
		}
	}
}

impl From<simdutf8::basic::Utf8Error> for ErrorKind {
	fn from(value: simdutf8::basic::Utf8Error) -> Self {
		Self::Utf8(value)
	}
}

impl Context {
	pub fn as_str(&self) -> &'static str {
		match self {
			Context::Read     => "read",
			Context::Fill     => "fill from source",
			Context::Prefetch => "prefetch",
			Context::Preview  => "preview",
			Context::Discard  => "discard",
			Context::Write    => "write",
			Context::Flush    => "flush to sink",
			Context::Close    => "close",
			Context::Other(ctx) => ctx,
		}
	}
}

impl fmt::Display for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

pub(crate) trait ResultExt<T> {
	fn context(self, context: Context) -> Result<T>;
}

impl<T, E: Into<ErrorKind>> ResultExt<T> for result::Result<T, E> {
	fn context(self, context: Context) -> Result<T> {
		self.map_err(|err| Error::new(context, err.into()))
	}
}

impl<T> ResultExt<T> for Result<T> {
	fn context(mut self, context: Context) -> Self {
		if let Err(ref mut error) = self {
			error.context = context;
		}
		self
	}
}
