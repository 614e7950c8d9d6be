// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::mem::size_of;
use std::ops::Range;
use std::sync::Arc;
use bytemuck::{Pod, Zeroable};

/// A sharable, fixed-size block of memory backing a [`Chunk`](super::Chunk).
/// Cloning is `O(1)` and shares the block between holders; writes require
/// exclusive ownership, checked through the strong count. The last holder to
/// recycle a shared block returns it to the pool.
#[derive(Clone)]
pub struct Memory<const N: usize>(Arc<[u8; N]>);

impl<const N: usize> Memory<N> {
	/// Allocates a zeroed block.
	pub fn new() -> Self {
		Self(Arc::new([0; N]))
	}

	/// Returns a shared handle to the same block.
	pub fn share(&self) -> Self {
		self.clone()
	}

	/// Returns `true` if another handle shares this block.
	pub fn is_shared(&self) -> bool {
		Arc::strong_count(&self.0) > 1
	}

	/// Returns a slice of the block in `range`.
	pub fn slice(&self, range: Range<usize>) -> &[u8] {
		&self.0[range]
	}

	/// Returns a mutable slice of the block in `range`, or `None` if the block
	/// is shared.
	pub fn slice_mut(&mut self, range: Range<usize>) -> Option<&mut [u8]> {
		Some(&mut Arc::get_mut(&mut self.0)?[range])
	}

	/// Loads a native-order `T` from the bytes at `at`. Endianness is applied
	/// by the caller.
	pub fn load<T: Pod>(&self, at: usize) -> T {
		let mut value = T::zeroed();
		bytemuck::bytes_of_mut(&mut value)
			.copy_from_slice(&self.0[at..at + size_of::<T>()]);
		value
	}
}

impl<const N: usize> Default for Memory<N> {
	fn default() -> Self {
		Self::new()
	}
}

impl<const N: usize> fmt::Debug for Memory<N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Memory")
			.field("capacity", &N)
			.field("shared", &self.is_shared())
			.finish_non_exhaustive()
	}
}
