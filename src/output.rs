// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::mem;
use bytemuck::Pod;
use num_traits::PrimInt;
use crate::chunk::Chunk;
use crate::error::{Context, Error, Result, ResultExt};
use crate::input::FillSource;
use crate::packet::Packet;
use crate::pool::{Pool, SharedPool};
use crate::void::VoidSink;
use crate::SIZE;

/// Bytes reserved at the end of each fresh chunk for a later-appended
/// trailer. Packet merging may reclaim the space.
pub const TRAILER_RESERVATION: usize = 8;

/// The largest boundary chunk [`Output::write_packet`] copies into gap space
/// instead of splicing.
const MERGE_COPY_MAX: usize = 200;

/// The push side of an [`Output`]: receives flushed chunk contents.
pub trait FlushSink {
	/// Writes all of `data` to the sink. The chunk holding it is recycled by
	/// the caller afterwards.
	fn flush(&mut self, data: &[u8]) -> io::Result<()>;

	/// Releases the sink. Called exactly once by [`Output::close`].
	fn close_sink(&mut self) -> io::Result<()> {
		Ok(())
	}
}

/// A buffered, chunk-oriented byte writer over a [`FlushSink`].
///
/// Writes accumulate across a chain of chunks borrowed from the pool; the
/// head of the chain stays put until [`flush`] hands the chunks to the sink
/// or, for a [`PacketBuilder`], [`build`] freezes them into a [`Packet`].
/// Writing a packet splices its chunks in without copying, merging small
/// boundary chunks into reserved gap space instead. Not safe for concurrent
/// use.
///
/// Closing flushes, recycles every owned chunk exactly once and releases the
/// sink; dropping an unclosed writer closes it, discarding any error.
///
/// [`flush`]: Self::flush
/// [`build`]: Output::build
pub struct Output<F: FlushSink, const N: usize = SIZE, P: Pool<N> = SharedPool<N>> {
	sink: F,
	pool: P,
	/// Committed chunks, oldest first. The chunk being written lives in
	/// `tail` until it fills.
	chain: VecDeque<Chunk<N>>,
	tail: Option<Chunk<N>>,
	chained_size: usize,
	closed: bool,
}

impl<F: FlushSink, const N: usize, P: Pool<N>> Output<F, N, P> {
	/// Creates a writer flushing to `sink` with chunks borrowed from `pool`.
	pub fn new(sink: F, pool: P) -> Self {
		Self {
			sink,
			pool,
			chain: VecDeque::new(),
			tail: None,
			chained_size: 0,
			closed: false,
		}
	}

	/// Returns the number of buffered bytes.
	pub fn size(&self) -> usize {
		self.chained_size + self.tail.as_ref().map_or(0, Chunk::len)
	}

	/// Returns `true` if no bytes are buffered.
	pub fn is_empty(&self) -> bool {
		self.size() == 0
	}

	/// Returns the number of chunks currently buffered.
	pub fn chunk_count(&self) -> usize {
		self.chain.len() + usize::from(self.tail.is_some())
	}

	/// Borrows the sink.
	pub fn sink(&self) -> &F {
		&self.sink
	}

	/// Borrows the sink mutably.
	pub fn sink_mut(&mut self) -> &mut F {
		&mut self.sink
	}

	/// Writes all of `data`.
	pub fn write_from_slice(&mut self, data: &[u8]) -> Result {
		self.check_open(Context::Write)?;
		let mut data = data;
		while !data.is_empty() {
			let tail = self.writable_tail();
			let written = tail.write(data)
				.expect("the tail chunk is exclusively owned");
			data = &data[written..];
		}
		Ok(())
	}

	/// Writes an arbitrary [`Pod`] value in native byte order.
	#[inline]
	pub fn write_pod<T: Pod>(&mut self, value: T) -> Result {
		self.write_from_slice(bytemuck::bytes_of(&value))
	}

	/// Writes a big-endian integer.
	#[inline]
	pub fn write_int<T: PrimInt + Pod>(&mut self, value: T) -> Result {
		self.write_pod(value.to_be())
	}

	/// Writes a little-endian integer.
	#[inline]
	pub fn write_int_le<T: PrimInt + Pod>(&mut self, value: T) -> Result {
		self.write_pod(value.to_le())
	}

	/// Writes a [`u8`].
	#[inline]
	pub fn write_u8(&mut self, value: u8) -> Result { self.write_pod(value) }

	/// Writes an [`i8`].
	#[inline]
	pub fn write_i8(&mut self, value: i8) -> Result {
		self.write_u8(value as u8)
	}

	/// Writes a big-endian [`u16`].
	#[inline]
	pub fn write_u16(&mut self, value: u16) -> Result { self.write_int(value) }

	/// Writes a little-endian [`u16`].
	#[inline]
	pub fn write_u16_le(&mut self, value: u16) -> Result { self.write_int_le(value) }

	/// Writes a big-endian [`i16`].
	#[inline]
	pub fn write_i16(&mut self, value: i16) -> Result { self.write_int(value) }

	/// Writes a little-endian [`i16`].
	#[inline]
	pub fn write_i16_le(&mut self, value: i16) -> Result { self.write_int_le(value) }

	/// Writes a big-endian [`u32`].
	#[inline]
	pub fn write_u32(&mut self, value: u32) -> Result { self.write_int(value) }

	/// Writes a little-endian [`u32`].
	#[inline]
	pub fn write_u32_le(&mut self, value: u32) -> Result { self.write_int_le(value) }

	/// Writes a big-endian [`i32`].
	#[inline]
	pub fn write_i32(&mut self, value: i32) -> Result { self.write_int(value) }

	/// Writes a little-endian [`i32`].
	#[inline]
	pub fn write_i32_le(&mut self, value: i32) -> Result { self.write_int_le(value) }

	/// Writes a big-endian [`u64`].
	#[inline]
	pub fn write_u64(&mut self, value: u64) -> Result { self.write_int(value) }

	/// Writes a little-endian [`u64`].
	#[inline]
	pub fn write_u64_le(&mut self, value: u64) -> Result { self.write_int_le(value) }

	/// Writes a big-endian [`i64`].
	#[inline]
	pub fn write_i64(&mut self, value: i64) -> Result { self.write_int(value) }

	/// Writes a little-endian [`i64`].
	#[inline]
	pub fn write_i64_le(&mut self, value: i64) -> Result { self.write_int_le(value) }

	/// Writes a big-endian [`f32`].
	#[inline]
	pub fn write_f32(&mut self, value: f32) -> Result {
		self.write_u32(value.to_bits())
	}

	/// Writes a little-endian [`f32`].
	#[inline]
	pub fn write_f32_le(&mut self, value: f32) -> Result {
		self.write_u32_le(value.to_bits())
	}

	/// Writes a big-endian [`f64`].
	#[inline]
	pub fn write_f64(&mut self, value: f64) -> Result {
		self.write_u64(value.to_bits())
	}

	/// Writes a little-endian [`f64`].
	#[inline]
	pub fn write_f64_le(&mut self, value: f64) -> Result {
		self.write_u64_le(value.to_bits())
	}

	/// Writes every element of `values` big-endian.
	pub fn write_int_slice<T: PrimInt + Pod>(&mut self, values: &[T]) -> Result {
		for &value in values {
			self.write_int(value)?;
		}
		Ok(())
	}

	/// Writes every element of `values` big-endian.
	pub fn write_f32_slice(&mut self, values: &[f32]) -> Result {
		for &value in values {
			self.write_f32(value)?;
		}
		Ok(())
	}

	/// Writes every element of `values` big-endian.
	pub fn write_f64_slice(&mut self, values: &[f64]) -> Result {
		for &value in values {
			self.write_f64(value)?;
		}
		Ok(())
	}

	/// Appends one character as UTF-8, one to four bytes by code point range.
	pub fn append_char(&mut self, value: char) -> Result {
		let code = value as u32;
		let mut bytes = [0u8; 4];
		let encoded: &[u8] = if code <= 0x7F {
			bytes[0] = code as u8;
			&bytes[..1]
		} else if code <= 0x7FF {
			bytes[0] = 0xC0 | (code >> 6) as u8;
			bytes[1] = 0x80 | (code & 0x3F) as u8;
			&bytes[..2]
		} else if code <= 0xFFFF {
			bytes[0] = 0xE0 | (code >> 12) as u8;
			bytes[1] = 0x80 | ((code >> 6) & 0x3F) as u8;
			bytes[2] = 0x80 | (code & 0x3F) as u8;
			&bytes[..3]
		} else {
			bytes[0] = 0xF0 | (code >> 18) as u8;
			bytes[1] = 0x80 | ((code >> 12) & 0x3F) as u8;
			bytes[2] = 0x80 | ((code >> 6) & 0x3F) as u8;
			bytes[3] = 0x80 | (code & 0x3F) as u8;
			&bytes[..4]
		};
		self.write_from_slice(encoded)
	}

	/// Appends characters as UTF-8.
	pub fn append_chars(&mut self, values: impl IntoIterator<Item = char>) -> Result {
		for value in values {
			self.append_char(value)?;
		}
		Ok(())
	}

	/// Writes `text` UTF-8-encoded, returning the byte count written.
	pub fn write_utf8(&mut self, text: &str) -> Result<usize> {
		self.write_from_slice(text.as_bytes())?;
		Ok(text.len())
	}

	/// Writes `text`, or the literal string `"null"` when `None`, returning
	/// the byte count written.
	pub fn append_nullable(&mut self, text: Option<&str>) -> Result<usize> {
		self.write_utf8(text.unwrap_or("null"))
	}

	/// Writes `value` repeated `count` times.
	pub fn fill_bytes(&mut self, value: u8, count: usize) -> Result {
		self.check_open(Context::Write)?;
		let mut remaining = count;
		while remaining > 0 {
			let tail = self.writable_tail();
			let dst = tail.writable_mut()
				.expect("the tail chunk is exclusively owned");
			let run = min(dst.len(), remaining);
			dst[..run].fill(value);
			tail.commit(run);
			remaining -= run;
		}
		Ok(())
	}

	/// Takes ownership of `packet` and appends its bytes. Chunks are spliced
	/// in without copying, except that a small boundary chunk is copied into
	/// the neighbouring chunk's gap space: the foreign head into the tail's
	/// remaining capacity, or the tail's content into the foreign head's
	/// start gap, whichever moves fewer bytes.
	pub fn write_packet(&mut self, packet: Packet<N, P>) -> Result {
		self.check_open(Context::Write)?;
		let mut chunks = packet.into_chunks();
		if let (Some(tail), Some(head)) = (self.tail.as_mut(), chunks.front_mut()) {
			let head_len = head.len();
			let tail_len = tail.len();
			let append_fits = head_len <= MERGE_COPY_MAX
				&& head_len <= N - tail.write_position()
				&& tail.is_exclusive();
			let prepend_fits = tail_len <= MERGE_COPY_MAX
				&& tail_len <= head.read_position()
				&& head.is_exclusive();
			if append_fits && (!prepend_fits || head_len <= tail_len) {
				let merged = tail.write_into_end_gap(head.data());
				debug_assert!(merged, "append merge was checked to fit");
				if let Some(head) = chunks.pop_front() {
					self.pool.recycle(head);
				}
			} else if prepend_fits {
				let merged = head.prepend(tail.data());
				debug_assert!(merged, "prepend merge was checked to fit");
				if let Some(tail) = self.tail.take() {
					self.pool.recycle(tail);
				}
			}
		}
		self.splice_chunks(chunks);
		Ok(())
	}

	/// Writes exactly `count` bytes from `packet`, leaving the remainder in
	/// it. Whole chunks are spliced without copying; a partial boundary chunk
	/// is copied. Fails with an end-of-input error if the packet is shorter
	/// than `count`.
	pub fn write_packet_count(&mut self, packet: &mut Packet<N, P>, count: usize) -> Result {
		self.check_open(Context::Write)?;
		if count > packet.size() {
			return Err(Error::end_of_input(count, Context::Write));
		}
		let mut remaining = count;
		while remaining > 0 {
			let Some(front_len) = packet.front_len() else {
				break;
			};
			if front_len <= remaining {
				if let Some(chunk) = packet.pop_front_chunk() {
					remaining -= front_len;
					self.splice_chunk(chunk);
				}
			} else {
				self.write_from_slice(packet.front_data(remaining))?;
				packet.consume_front(remaining);
				remaining = 0;
			}
		}
		Ok(())
	}

	/// Detaches the whole chain, committing the tail's written length, and
	/// resets the writer for reuse. Returns the chunks in write order.
	pub fn steal_all(&mut self) -> VecDeque<Chunk<N>> {
		self.commit_tail();
		self.chained_size = 0;
		mem::take(&mut self.chain)
	}

	/// Hands every buffered chunk to the sink head-to-tail, recycling each.
	/// On a sink error the remaining chunks are recycled unflushed before the
	/// error propagates.
	pub fn flush(&mut self) -> Result {
		self.check_open(Context::Flush)?;
		let mut chunks = self.steal_all();
		let mut failure = None;
		while let Some(chunk) = chunks.pop_front() {
			if failure.is_none() {
				failure = self.sink.flush(chunk.data()).err();
			}
			self.pool.recycle(chunk);
		}
		match failure {
			Some(error) => Err(error).context(Context::Flush),
			None => Ok(()),
		}
	}

	/// Recycles every buffered chunk without flushing or building anything.
	pub fn reset(&mut self) {
		for chunk in self.steal_all() {
			self.pool.recycle(chunk);
		}
	}

	/// Flushes, then releases the sink. Closing twice is an error; dropping
	/// an unclosed writer closes it instead.
	pub fn close(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(Context::Close));
		}
		let flushed = self.flush();
		self.closed = true;
		let closed = self.sink.close_sink().context(Context::Close);
		flushed.and(closed)
	}

	/// Fills the tail chunk's writable region directly from `source`,
	/// returning the byte count written. The zero-copy half of
	/// [`Input::read_available_to`](crate::Input::read_available_to).
	pub(crate) fn fill_tail_from(&mut self, source: &mut impl FillSource) -> Result<usize> {
		self.check_open(Context::Write)?;
		let tail = self.writable_tail();
		let dst = tail.writable_mut()
			.expect("the tail chunk is exclusively owned");
		let capacity = dst.len();
		let read = source.fill(dst).context(Context::Fill)?;
		assert!(read <= capacity, "fill source reported more bytes than the chunk region holds");
		tail.commit(read);
		Ok(read)
	}

	pub(crate) fn pool(&self) -> &P {
		&self.pool
	}

	fn check_open(&self, context: Context) -> Result {
		if self.closed {
			Err(Error::closed(context))
		} else {
			Ok(())
		}
	}

	/// Returns the tail chunk, appending a fresh one if the current tail is
	/// full, shared, or absent.
	fn writable_tail(&mut self) -> &mut Chunk<N> {
		let needs_new = match &self.tail {
			Some(tail) => tail.is_full() || !tail.is_exclusive(),
			None => true,
		};
		if needs_new {
			self.commit_tail();
			let mut chunk = self.pool.borrow();
			chunk.reserve_end(TRAILER_RESERVATION);
			self.tail = Some(chunk);
		}
		self.tail.as_mut().expect("a writable tail chunk was just appended")
	}

	/// Moves the tail into the committed chain.
	fn commit_tail(&mut self) {
		if let Some(tail) = self.tail.take() {
			if tail.is_empty() {
				self.pool.recycle(tail);
			} else {
				self.chained_size += tail.len();
				self.chain.push_back(tail);
			}
		}
	}

	/// Appends foreign chunks after the current tail; the last one becomes
	/// the new tail.
	fn splice_chunks(&mut self, mut chunks: VecDeque<Chunk<N>>) {
		let Some(last) = chunks.pop_back() else {
			return;
		};
		self.commit_tail();
		for chunk in chunks {
			if chunk.is_empty() {
				self.pool.recycle(chunk);
			} else {
				self.chained_size += chunk.len();
				self.chain.push_back(chunk);
			}
		}
		if last.is_empty() {
			self.pool.recycle(last);
		} else {
			self.tail = Some(last);
		}
	}

	fn splice_chunk(&mut self, chunk: Chunk<N>) {
		if chunk.is_empty() {
			self.pool.recycle(chunk);
			return;
		}
		self.commit_tail();
		self.tail = Some(chunk);
	}
}

impl<const N: usize, P: Pool<N>> Output<VoidSink, N, P> {
	/// Creates a packet builder: a writer that buffers everything until
	/// [`build`](Self::build) freezes it into a packet.
	pub fn builder(pool: P) -> Self {
		Self::new(VoidSink, pool)
	}

	/// Freezes the buffered bytes into an immutable [`Packet`] in constant
	/// time, leaving the builder empty and reusable.
	pub fn build(&mut self) -> Packet<N, P> {
		let size = self.size();
		let chunks = self.steal_all();
		Packet::from_chunks(chunks, size, self.pool.clone())
	}
}

impl<F: FlushSink, const N: usize, P: Pool<N>> Drop for Output<F, N, P> {
	fn drop(&mut self) {
		if !self.closed {
			let _ = self.close();
		}
	}
}

impl<F: FlushSink, const N: usize, P: Pool<N>> fmt::Debug for Output<F, N, P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Output")
			.field("size", &self.size())
			.field("chunks", &self.chunk_count())
			.field("closed", &self.closed)
			.finish_non_exhaustive()
	}
}

/// A packet builder: an [`Output`] that accumulates chunks until
/// [`build`](Output::build) freezes them into a [`Packet`].
pub type PacketBuilder<const N: usize = SIZE, P = SharedPool<N>> = Output<VoidSink, N, P>;
