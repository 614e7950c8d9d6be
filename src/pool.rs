// SPDX-License-Identifier: Apache-2.0

//! Chunk pooling.
//!
//! Readers, writers and packets borrow chunks from a pool and recycle them
//! when done. The default [`SharedPool`] keeps a bounded lock-free free list
//! behind an [`Arc`], so one pool instance can serve any number of threads;
//! recycled chunks beyond the retention cap are dropped. [`pool`] hands out
//! the process-wide default instance.

use std::fmt;
use std::sync::Arc;
use crossbeam_queue::ArrayQueue;
use once_cell::sync::Lazy;
use crate::chunk::{Chunk, Memory};
use crate::SIZE;

/// The number of chunks the default pool retains before dropping recycled
/// memory.
pub const DEFAULT_RETAINED: usize = 64;

/// A bounded free list of reusable chunks of one capacity.
pub trait Pool<const N: usize = SIZE>: Clone {
	/// Borrows a chunk with cleared cursors and no reservations installed;
	/// callers install head/tail gaps themselves.
	fn borrow(&self) -> Chunk<N>;

	/// Returns a chunk to the pool. Memory still shared with another handle
	/// is dropped instead; the final holder's recycle returns it for reuse.
	/// Recycling the same chunk twice is impossible, since the chunk is
	/// consumed by value.
	fn recycle(&self, chunk: Chunk<N>);

	/// Returns `true` if `other` is the same pool instance.
	fn is_shared_with(&self, other: &Self) -> bool;
}

/// The default chunk pool. Borrow and recycle are lock-free, and clones share
/// one free list, so a single instance may serve multiple threads.
#[derive(Clone)]
pub struct SharedPool<const N: usize = SIZE>(Arc<ArrayQueue<Memory<N>>>);

impl<const N: usize> SharedPool<N> {
	/// Creates a pool retaining at most `retained` recycled chunks.
	pub fn new(retained: usize) -> Self {
		Self(Arc::new(ArrayQueue::new(retained)))
	}

	/// Returns the number of chunks currently held in the free list.
	pub fn free_count(&self) -> usize {
		self.0.len()
	}
}

impl<const N: usize> Default for SharedPool<N> {
	fn default() -> Self {
		Self::new(DEFAULT_RETAINED)
	}
}

impl<const N: usize> Pool<N> for SharedPool<N> {
	fn borrow(&self) -> Chunk<N> {
		Chunk::fresh(self.0.pop().unwrap_or_default())
	}

	fn recycle(&self, chunk: Chunk<N>) {
		if let Some(mem) = chunk.into_exclusive_memory() {
			// A full free list drops the memory.
			let _ = self.0.push(mem);
		}
	}

	fn is_shared_with(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl<const N: usize> fmt::Debug for SharedPool<N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SharedPool")
			.field("chunk_size", &N)
			.field("free", &self.free_count())
			.finish_non_exhaustive()
	}
}

/// Clones a handle to the process-wide default pool.
#[inline]
pub fn pool() -> SharedPool {
	POOL.clone()
}

static POOL: Lazy<SharedPool> = Lazy::new(SharedPool::default);

#[cfg(test)]
mod test {
	use super::{Pool, SharedPool};

	#[test]
	fn recycle_then_reuse() {
		let pool: SharedPool<32> = SharedPool::new(4);
		let mut chunk = pool.borrow();
		chunk.write(b"data").unwrap();
		pool.recycle(chunk);
		assert_eq!(pool.free_count(), 1);

		// The reused chunk comes back with cleared cursors.
		let chunk = pool.borrow();
		assert!(chunk.is_empty());
		assert_eq!(chunk.writable(), 32);
		assert_eq!(pool.free_count(), 0);
	}

	#[test]
	fn shared_memory_pools_once() {
		let pool: SharedPool<32> = SharedPool::new(4);
		let chunk = pool.borrow();
		let shared = chunk.share();
		pool.recycle(chunk);
		assert_eq!(pool.free_count(), 0);
		pool.recycle(shared);
		assert_eq!(pool.free_count(), 1);
	}

	#[test]
	fn retention_cap() {
		let pool: SharedPool<32> = SharedPool::new(1);
		let a = pool.borrow();
		let b = pool.borrow();
		pool.recycle(a);
		pool.recycle(b);
		assert_eq!(pool.free_count(), 1);
	}

	#[test]
	fn instance_identity() {
		let a: SharedPool<32> = SharedPool::new(1);
		let b = a.clone();
		let c: SharedPool<32> = SharedPool::new(1);
		assert!(a.is_shared_with(&b));
		assert!(!a.is_shared_with(&c));
	}
}
