// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use crate::chunk::Chunk;
use crate::input::Input;
use crate::pool::{Pool, SharedPool};
use crate::void::VoidSource;
use crate::SIZE;

/// An immutable, chain-backed byte sequence frozen from a
/// [`PacketBuilder`](crate::PacketBuilder) in constant time.
///
/// Copying shares the underlying chunks rather than duplicating bytes; each
/// handle returns its chunks to the pool when released, and shared memory
/// reaches the free list once the last handle lets go. A packet is consumed
/// exactly once, by [`reader`](Self::reader); dropping it unread releases it.
pub struct Packet<const N: usize = SIZE, P: Pool<N> = SharedPool<N>> {
	chunks: VecDeque<Chunk<N>>,
	size: usize,
	pool: P,
}

/// A reader over a consumed [`Packet`]; it never refills, so reaching the end
/// of the chain is the end of input.
pub type PacketReader<const N: usize = SIZE, P = SharedPool<N>> = Input<VoidSource, N, P>;

impl<const N: usize, P: Pool<N>> Packet<N, P> {
	pub(crate) fn from_chunks(chunks: VecDeque<Chunk<N>>, size: usize, pool: P) -> Self {
		debug_assert_eq!(size, chunks.iter().map(Chunk::len).sum::<usize>());
		Self { chunks, size, pool }
	}

	/// Returns the total byte length.
	pub fn size(&self) -> usize {
		self.size
	}

	/// Returns `true` if the packet holds no bytes.
	pub fn is_empty(&self) -> bool {
		self.size == 0
	}

	/// Returns a second handle to the same bytes. Chunks are shared, not
	/// duplicated; both handles read independently.
	pub fn copy(&self) -> Self {
		Self {
			chunks: self.chunks.iter().map(Chunk::share).collect(),
			size: self.size,
			pool: self.pool.clone(),
		}
	}

	/// Consumes the packet as an [`Input`] over its bytes.
	pub fn reader(mut self) -> PacketReader<N, P> {
		let chunks = mem::take(&mut self.chunks);
		self.size = 0;
		Input::with_chunks(VoidSource, self.pool.clone(), chunks)
	}

	/// Discards the packet, recycling its chunks. Equivalent to dropping it.
	pub fn release(self) {}

	pub(crate) fn into_chunks(mut self) -> VecDeque<Chunk<N>> {
		self.size = 0;
		mem::take(&mut self.chunks)
	}

	pub(crate) fn front_len(&self) -> Option<usize> {
		self.chunks.front().map(Chunk::len)
	}

	/// Returns the first `limit` readable bytes of the front chunk.
	pub(crate) fn front_data(&self, limit: usize) -> &[u8] {
		let front = self.chunks.front()
			.expect("the packet holds a front chunk");
		&front.data()[..limit]
	}

	pub(crate) fn pop_front_chunk(&mut self) -> Option<Chunk<N>> {
		let chunk = self.chunks.pop_front()?;
		self.size -= chunk.len();
		Some(chunk)
	}

	pub(crate) fn consume_front(&mut self, count: usize) {
		if let Some(front) = self.chunks.front_mut() {
			front.consume(count);
			self.size -= count;
		}
	}
}

impl<const N: usize, P: Pool<N>> Drop for Packet<N, P> {
	fn drop(&mut self) {
		while let Some(chunk) = self.chunks.pop_front() {
			self.pool.recycle(chunk);
		}
	}
}

impl<const N: usize, P: Pool<N>> fmt::Debug for Packet<N, P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Packet")
			.field("size", &self.size)
			.field("chunks", &self.chunks.len())
			.finish_non_exhaustive()
	}
}
