// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the integration tests: a chunk pool that keeps
//! borrow/recycle accounts, and a fill source serving a scripted sequence of
//! pieces.

use std::collections::VecDeque;
use std::fmt::{Arguments, Debug};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use pakio::pool::{Pool, SharedPool};
use pakio::{Chunk, FillSource, SIZE};

macro_rules! qc_assert_eq {
	($left:expr,$right:expr) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, None)
			)
		}
	}};
	($left:expr,$right:expr,$($arg:tt)+) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, Some(format_args!($($arg)+)))
			)
		}
	}};
}

pub fn format_qc_assert_error<L: Debug, R: Debug>(left: &L, right: &R, msg: Option<Arguments>) -> String {
	if let Some(msg) = msg {
		format!(
			"assertion failed `(left == right)`: {msg}\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	} else {
		format!(
			"assertion failed `(left == right)`:\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	}
}

/// A pool wrapper counting borrows and recycles, for leak accounting.
#[derive(Clone)]
pub struct CountingPool<const N: usize = SIZE>(Arc<Counters<N>>);

pub struct Counters<const N: usize> {
	inner: SharedPool<N>,
	borrowed: AtomicUsize,
	recycled: AtomicUsize,
}

impl<const N: usize> CountingPool<N> {
	pub fn new() -> Self {
		Self(Arc::new(Counters {
			inner: SharedPool::default(),
			borrowed: AtomicUsize::new(0),
			recycled: AtomicUsize::new(0),
		}))
	}

	pub fn borrowed(&self) -> usize {
		self.0.borrowed.load(Ordering::Relaxed)
	}

	pub fn recycled(&self) -> usize {
		self.0.recycled.load(Ordering::Relaxed)
	}

	pub fn is_balanced(&self) -> bool {
		self.borrowed() == self.recycled()
	}
}

impl<const N: usize> Default for CountingPool<N> {
	fn default() -> Self {
		Self::new()
	}
}

impl<const N: usize> Pool<N> for CountingPool<N> {
	fn borrow(&self) -> Chunk<N> {
		self.0.borrowed.fetch_add(1, Ordering::Relaxed);
		self.0.inner.borrow()
	}

	fn recycle(&self, chunk: Chunk<N>) {
		// A shared handle's recycle only drops a reference; the final
		// holder's recycle is the one that releases the borrowed memory.
		if chunk.is_exclusive() {
			self.0.recycled.fetch_add(1, Ordering::Relaxed);
		}
		self.0.inner.recycle(chunk);
	}

	fn is_shared_with(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

/// A fill source serving a scripted sequence of pieces, one per fill call.
pub struct ChunkedSource {
	pieces: VecDeque<Vec<u8>>,
	fills: Arc<AtomicUsize>,
	closes: Arc<AtomicUsize>,
}

impl ChunkedSource {
	pub fn new<T: AsRef<[u8]>>(pieces: impl IntoIterator<Item = T>) -> Self {
		Self {
			pieces: pieces.into_iter().map(|piece| piece.as_ref().to_vec()).collect(),
			fills: Arc::default(),
			closes: Arc::default(),
		}
	}

	pub fn empty() -> Self {
		Self::new(Vec::<&[u8]>::new())
	}

	/// Returns a handle to the fill-call count, usable after the source has
	/// been moved into a reader.
	pub fn fill_counter(&self) -> Arc<AtomicUsize> {
		self.fills.clone()
	}

	pub fn close_counter(&self) -> Arc<AtomicUsize> {
		self.closes.clone()
	}
}

impl FillSource for ChunkedSource {
	fn fill(&mut self, dst: &mut [u8]) -> io::Result<usize> {
		self.fills.fetch_add(1, Ordering::Relaxed);
		let Some(piece) = self.pieces.pop_front() else {
			return Ok(0);
		};
		assert!(piece.len() <= dst.len(), "scripted piece exceeds the chunk region");
		dst[..piece.len()].copy_from_slice(&piece);
		Ok(piece.len())
	}

	fn close_source(&mut self) -> io::Result<()> {
		self.closes.fetch_add(1, Ordering::Relaxed);
		Ok(())
	}
}
