// SPDX-License-Identifier: Apache-2.0

mod recorded;

use std::cmp::min;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::mem::size_of;
use bytemuck::{Pod, Zeroable};
use num_traits::PrimInt;
use recorded::RecordedChain;
use crate::chunk::Chunk;
use crate::error::{Context, Error, Result, ResultExt};
use crate::output::{FlushSink, Output};
use crate::pool::{Pool, SharedPool};
use crate::SIZE;

/// The pull side of an [`Input`]: fills chunk regions with bytes on demand.
pub trait FillSource {
	/// Reads bytes into `dst`, returning the count written. `0` signals the
	/// end of the source. A fill may block.
	fn fill(&mut self, dst: &mut [u8]) -> io::Result<usize>;

	/// Releases the underlying resource. Called exactly once by
	/// [`Input::close`].
	fn close_source(&mut self) -> io::Result<()> {
		Ok(())
	}
}

/// A buffered, chunk-oriented byte reader over a [`FillSource`].
///
/// One chunk is active at a time. When a [`preview`] session is open, or
/// after [`prefetch`] has pulled ahead, visited chunks are retained in a
/// recorded chain and drained as reading proceeds, so lookahead never loses
/// bytes. Not safe for concurrent use; a single instance belongs to one
/// thread at a time.
///
/// Closing recycles every owned chunk exactly once and releases the source;
/// dropping an unclosed reader closes it, discarding any close error.
///
/// [`preview`]: Self::preview
/// [`prefetch`]: Self::prefetch
pub struct Input<S: FillSource, const N: usize = SIZE, P: Pool<N> = SharedPool<N>> {
	source: S,
	pool: P,
	/// The active chunk while no recorded chain is open. With a chain open,
	/// the active chunk is the entry at `preview_index` instead.
	head: Option<Chunk<N>>,
	position: usize,
	limit: usize,
	preview_index: usize,
	/// `true` while no preview session is open; drained chunks may then be
	/// recycled as they are consumed.
	preview_discard: bool,
	recorded: Option<RecordedChain<N>>,
	closed: bool,
}

impl<S: FillSource, const N: usize, P: Pool<N>> Input<S, N, P> {
	/// Creates a reader pulling from `source` with chunks borrowed from
	/// `pool`.
	pub fn new(source: S, pool: P) -> Self {
		Self {
			source,
			pool,
			head: None,
			position: 0,
			limit: 0,
			preview_index: 0,
			preview_discard: true,
			recorded: None,
			closed: false,
		}
	}

	/// Creates a reader pre-seeded with `chunks`, which are consumed before
	/// the source is filled from. Empty chunks are recycled immediately.
	pub fn with_chunks(source: S, pool: P, chunks: impl IntoIterator<Item = Chunk<N>>) -> Self {
		let mut input = Self::new(source, pool);
		let mut seeded = VecDeque::new();
		for chunk in chunks {
			if chunk.is_empty() {
				input.pool.recycle(chunk);
			} else {
				seeded.push_back(chunk);
			}
		}
		if seeded.len() == 1 {
			if let Some(chunk) = seeded.pop_front() {
				input.position = chunk.read_position();
				input.limit = chunk.write_position();
				input.head = Some(chunk);
			}
		} else if !seeded.is_empty() {
			let mut chain = RecordedChain::new();
			for chunk in seeded {
				let limit = chunk.write_position();
				chain.push(chunk, limit);
			}
			input.recorded = Some(chain);
			input.bind_recorded(0);
		}
		input
	}

	/// Returns the number of bytes cached across the active chunk and any
	/// retained chain, readable without touching the source.
	pub fn available(&self) -> usize {
		self.window() + self.cached_beyond_window()
	}

	/// Returns `true` if the reader is at the end of its input, filling from
	/// the source if nothing is cached.
	pub fn eof(&mut self) -> Result<bool> {
		self.check_open(Context::Read)?;
		Ok(self.window() == 0 && self.fetch_cached_or_fill().context(Context::Read)? == 0)
	}

	/// Reads an arbitrary [`Pod`] value in native byte order.
	pub fn read_pod<T: Pod>(&mut self) -> Result<T> {
		self.check_open(Context::Read)?;
		let size = size_of::<T>();
		if size > 0 && self.window() >= size {
			let chunk = self.active_chunk()
				.expect("an active chunk backs a non-empty window");
			let value = chunk.memory().load::<T>(self.position);
			self.position += size;
			Ok(value)
		} else {
			self.read_pod_across_chunks()
		}
	}

	/// Reads a big-endian integer.
	#[inline]
	pub fn read_int<T: PrimInt + Pod>(&mut self) -> Result<T> {
		self.read_pod().map(T::from_be)
	}

	/// Reads a little-endian integer.
	#[inline]
	pub fn read_int_le<T: PrimInt + Pod>(&mut self) -> Result<T> {
		self.read_pod().map(T::from_le)
	}

	/// Reads a [`u8`].
	#[inline]
	pub fn read_u8(&mut self) -> Result<u8> { self.read_pod() }

	/// Reads an [`i8`].
	#[inline]
	pub fn read_i8(&mut self) -> Result<i8> {
		self.read_u8().map(|v| v as i8)
	}

	/// Reads a big-endian [`u16`].
	#[inline]
	pub fn read_u16(&mut self) -> Result<u16> { self.read_int() }

	/// Reads a little-endian [`u16`].
	#[inline]
	pub fn read_u16_le(&mut self) -> Result<u16> { self.read_int_le() }

	/// Reads a big-endian [`i16`].
	#[inline]
	pub fn read_i16(&mut self) -> Result<i16> { self.read_int() }

	/// Reads a little-endian [`i16`].
	#[inline]
	pub fn read_i16_le(&mut self) -> Result<i16> { self.read_int_le() }

	/// Reads a big-endian [`u32`].
	#[inline]
	pub fn read_u32(&mut self) -> Result<u32> { self.read_int() }

	/// Reads a little-endian [`u32`].
	#[inline]
	pub fn read_u32_le(&mut self) -> Result<u32> { self.read_int_le() }

	/// Reads a big-endian [`i32`].
	#[inline]
	pub fn read_i32(&mut self) -> Result<i32> { self.read_int() }

	/// Reads a little-endian [`i32`].
	#[inline]
	pub fn read_i32_le(&mut self) -> Result<i32> { self.read_int_le() }

	/// Reads a big-endian [`u64`].
	#[inline]
	pub fn read_u64(&mut self) -> Result<u64> { self.read_int() }

	/// Reads a little-endian [`u64`].
	#[inline]
	pub fn read_u64_le(&mut self) -> Result<u64> { self.read_int_le() }

	/// Reads a big-endian [`i64`].
	#[inline]
	pub fn read_i64(&mut self) -> Result<i64> { self.read_int() }

	/// Reads a little-endian [`i64`].
	#[inline]
	pub fn read_i64_le(&mut self) -> Result<i64> { self.read_int_le() }

	/// Reads a big-endian [`f32`].
	#[inline]
	pub fn read_f32(&mut self) -> Result<f32> {
		self.read_u32().map(f32::from_bits)
	}

	/// Reads a little-endian [`f32`].
	#[inline]
	pub fn read_f32_le(&mut self) -> Result<f32> {
		self.read_u32_le().map(f32::from_bits)
	}

	/// Reads a big-endian [`f64`].
	#[inline]
	pub fn read_f64(&mut self) -> Result<f64> {
		self.read_u64().map(f64::from_bits)
	}

	/// Reads a little-endian [`f64`].
	#[inline]
	pub fn read_f64_le(&mut self) -> Result<f64> {
		self.read_u64_le().map(f64::from_bits)
	}

	/// Fills all of `dst`, or fails with an end-of-input error. Bytes read
	/// before the failure stay consumed.
	pub fn read_fully(&mut self, dst: &mut [u8]) -> Result {
		self.check_open(Context::Read)?;
		let mut copied = 0;
		while copied < dst.len() {
			if self.window() == 0 && self.fetch_cached_or_fill().context(Context::Read)? == 0 {
				return Err(Error::end_of_input(dst.len() - copied, Context::Read));
			}
			let data = self.active_data();
			let run = min(data.len(), dst.len() - copied);
			dst[copied..copied + run].copy_from_slice(&data[..run]);
			self.position += run;
			copied += run;
		}
		Ok(())
	}

	/// Reads up to `dst.len()` bytes, returning the count read. All cached
	/// bytes are consumed first; the source is filled from at most once, and
	/// only when nothing is cached. Returns `0` at the end of input.
	pub fn read_available(&mut self, dst: &mut [u8]) -> Result<usize> {
		self.check_open(Context::Read)?;
		let mut copied = 0;
		while copied < dst.len() {
			if self.window() == 0 {
				if copied > 0 && self.cached_beyond_window() == 0 {
					break;
				}
				if self.fetch_cached_or_fill().context(Context::Read)? == 0 {
					break;
				}
			}
			let data = self.active_data();
			let run = min(data.len(), dst.len() - copied);
			dst[copied..copied + run].copy_from_slice(&data[..run]);
			self.position += run;
			copied += run;
		}
		Ok(copied)
	}

	/// Reads exactly `byte_count` bytes as a UTF-8 string.
	pub fn read_utf8(&mut self, byte_count: usize) -> Result<String> {
		let mut bytes = vec![0; byte_count];
		self.read_fully(&mut bytes)?;
		simdutf8::basic::from_utf8(&bytes).context(Context::Read)?;
		// Safety: validated as UTF-8 just above.
		Ok(unsafe { String::from_utf8_unchecked(bytes) })
	}

	/// Runs `lookahead` over the upcoming bytes without consuming them:
	/// everything read inside the session is yielded again afterwards.
	/// Sessions nest; chunks visited while the outermost session is open are
	/// retained and replayed.
	///
	/// Fails with an end-of-input error if not even one byte is available.
	pub fn preview<R>(&mut self, lookahead: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
		self.check_open(Context::Preview)?;
		if self.window() == 0 && self.fetch_cached_or_fill().context(Context::Preview)? == 0 {
			return Err(Error::end_of_input(1, Context::Preview));
		}
		let saved_discard = self.preview_discard;
		let saved_index = self.preview_index;
		let saved_position = self.position;
		self.preview_discard = false;

		let result = lookahead(self);

		self.preview_discard = saved_discard;
		if self.recorded.is_some() {
			let bound = self.bind_recorded(saved_index);
			debug_assert!(bound, "the chunk a preview started in stays recorded");
		}
		self.preview_index = saved_index;
		self.position = saved_position;
		if saved_discard {
			self.collapse_single_entry();
		}
		result
	}

	/// Pulls chunks from the source until at least `count` bytes are cached,
	/// without consuming anything. Returns `false` if the source ends first.
	pub fn prefetch(&mut self, count: usize) -> Result<bool> {
		self.check_open(Context::Prefetch)?;
		if count <= self.window() {
			return Ok(true);
		}
		if self.recorded.is_none() {
			let mut chain = RecordedChain::new();
			if let Some(head) = self.head.take() {
				chain.push(head, self.limit);
			}
			self.recorded = Some(chain);
			self.preview_index = 0;
		}
		let mut total = self.available();
		while total < count {
			let mut chunk = self.pool.borrow();
			let read = match self.fill_chunk(&mut chunk) {
				Ok(read) => read,
				Err(error) => {
					self.pool.recycle(chunk);
					return Err(error).context(Context::Prefetch);
				}
			};
			if read == 0 {
				self.pool.recycle(chunk);
				self.forget_empty_chain();
				return Ok(false);
			}
			let position = chunk.read_position();
			let limit = chunk.write_position();
			let chain = self.recorded
				.as_mut()
				.expect("the recorded chain was just opened");
			chain.push(chunk, limit);
			if chain.len() == 1 {
				self.preview_index = 0;
				self.position = position;
				self.limit = limit;
			}
			total += read;
		}
		Ok(true)
	}

	/// Advances past `count` bytes, filling from the source as needed. Fails
	/// with an end-of-input error if the source ends first.
	pub fn discard(&mut self, count: usize) -> Result {
		self.check_open(Context::Discard)?;
		let mut remaining = count;
		while remaining > 0 {
			let run = min(remaining, self.window());
			self.position += run;
			remaining -= run;
			if remaining > 0 && self.fetch_cached_or_fill().context(Context::Discard)? == 0 {
				return Err(Error::end_of_input(remaining, Context::Discard));
			}
		}
		Ok(())
	}

	/// Moves available bytes into `output`, returning the count moved.
	///
	/// When nothing is cached and both ends draw from the same pool instance,
	/// the source fills the writer's tail chunk directly, with no
	/// intermediate copy and exactly one fill call. Otherwise cached bytes
	/// are copied over, filling from the source at most once.
	pub fn read_available_to<F: FlushSink>(&mut self, output: &mut Output<F, N, P>) -> Result<usize> {
		self.check_open(Context::Read)?;
		if self.available() == 0 {
			// Direct fills bypass this reader's chunks, so they are off the
			// table while a preview session must be able to replay them.
			if self.preview_discard && self.pool.is_shared_with(output.pool()) {
				return output.fill_tail_from(&mut self.source);
			}
			if self.fetch_cached_or_fill().context(Context::Read)? == 0 {
				return Ok(0);
			}
		}
		let mut moved = 0;
		loop {
			let data = self.active_data();
			if data.is_empty() {
				if self.cached_beyond_window() == 0 {
					break;
				}
				self.fetch_cached_or_fill().context(Context::Read)?;
				continue;
			}
			let run = data.len();
			output.write_from_slice(data)?;
			self.position += run;
			moved += run;
		}
		Ok(moved)
	}

	/// Moves available bytes into `chunk` until it fills, returning the count
	/// moved. Fills from the source at most once, and only when nothing is
	/// cached.
	pub fn read_available_to_chunk(&mut self, chunk: &mut Chunk<N>) -> Result<usize> {
		self.check_open(Context::Read)?;
		if self.available() == 0 && self.fetch_cached_or_fill().context(Context::Read)? == 0 {
			return Ok(0);
		}
		let mut moved = 0;
		while !chunk.is_full() {
			let data = self.active_data();
			if data.is_empty() {
				if self.cached_beyond_window() == 0 {
					break;
				}
				self.fetch_cached_or_fill().context(Context::Read)?;
				continue;
			}
			let run = match chunk.write(data) {
				Some(run) if run > 0 => run,
				_ => break,
			};
			self.position += run;
			moved += run;
		}
		Ok(moved)
	}

	/// Recycles every owned chunk and releases the source. Closing twice is
	/// an error; dropping an unclosed reader closes it instead.
	pub fn close(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(Context::Close));
		}
		self.closed = true;
		if let Some(head) = self.head.take() {
			self.pool.recycle(head);
		}
		if let Some(mut chain) = self.recorded.take() {
			while let Some(chunk) = chain.discard_first() {
				self.pool.recycle(chunk);
			}
		}
		self.position = 0;
		self.limit = 0;
		self.preview_index = 0;
		self.preview_discard = true;
		self.source.close_source().context(Context::Close)
	}

	fn check_open(&self, context: Context) -> Result {
		if self.closed {
			Err(Error::closed(context))
		} else {
			Ok(())
		}
	}

	/// Returns the number of unread bytes in the active chunk.
	fn window(&self) -> usize {
		self.limit - self.position
	}

	fn cached_beyond_window(&self) -> usize {
		self.recorded
			.as_ref()
			.map_or(0, |chain| chain.size_from(self.preview_index + 1))
	}

	fn active_chunk(&self) -> Option<&Chunk<N>> {
		match &self.recorded {
			Some(chain) => chain.get(self.preview_index).map(|(chunk, _)| chunk),
			None => self.head.as_ref(),
		}
	}

	fn active_data(&self) -> &[u8] {
		match self.active_chunk() {
			Some(chunk) => chunk.memory().slice(self.position..self.limit),
			None => &[],
		}
	}

	/// Makes the recorded entry at `index` the active chunk, positioned at
	/// the start of its replay range. Returns `false` if no such entry
	/// exists.
	fn bind_recorded(&mut self, index: usize) -> bool {
		let Some(chain) = self.recorded.as_ref() else {
			return false;
		};
		let Some((chunk, limit)) = chain.get(index) else {
			return false;
		};
		let position = chunk.read_position();
		self.preview_index = index;
		self.position = position;
		self.limit = limit;
		true
	}

	/// Makes the next batch of bytes active, preferring recorded chunks over
	/// the source. Returns the number of bytes then available in the active
	/// chunk, `0` meaning the source ended with nothing cached.
	fn fetch_cached_or_fill(&mut self) -> Result<usize> {
		if self.preview_discard {
			loop {
				if self.recorded.is_none() {
					return self.fill_from_source();
				}
				if let Some(chain) = self.recorded.as_mut() {
					if let Some(first) = chain.discard_first() {
						self.pool.recycle(first);
					}
				}
				if self.bind_recorded(0) {
					if self.window() > 0 {
						return Ok(self.window());
					}
				} else {
					self.recorded = None;
					self.preview_index = 0;
				}
			}
		} else {
			if self.recorded.is_none() {
				let mut chain = RecordedChain::new();
				if let Some(head) = self.head.take() {
					chain.push(head, self.limit);
				}
				self.recorded = Some(chain);
				self.preview_index = 0;
			}
			if self.bind_recorded(self.preview_index + 1) {
				Ok(self.window())
			} else {
				self.fill_into_recorded()
			}
		}
	}

	/// Refills the owned active chunk in place, borrowing one if needed.
	fn fill_from_source(&mut self) -> Result<usize> {
		let mut chunk = match self.head.take() {
			Some(mut chunk) if chunk.is_exclusive() => {
				chunk.reset();
				chunk
			}
			Some(chunk) => {
				self.pool.recycle(chunk);
				self.pool.borrow()
			}
			None => self.pool.borrow(),
		};
		let read = match self.fill_chunk(&mut chunk) {
			Ok(read) => read,
			Err(error) => {
				self.pool.recycle(chunk);
				return Err(error);
			}
		};
		if read == 0 {
			self.pool.recycle(chunk);
			self.position = 0;
			self.limit = 0;
			Ok(0)
		} else {
			self.position = chunk.read_position();
			self.limit = chunk.write_position();
			self.head = Some(chunk);
			Ok(read)
		}
	}

	/// Fills a fresh chunk and appends it to the recorded chain as the active
	/// chunk.
	fn fill_into_recorded(&mut self) -> Result<usize> {
		let mut chunk = self.pool.borrow();
		let read = match self.fill_chunk(&mut chunk) {
			Ok(read) => read,
			Err(error) => {
				self.pool.recycle(chunk);
				return Err(error);
			}
		};
		if read == 0 {
			self.pool.recycle(chunk);
			return Ok(0);
		}
		self.position = chunk.read_position();
		self.limit = chunk.write_position();
		let limit = self.limit;
		let chain = self.recorded
			.as_mut()
			.expect("a recorded chain is open while previewing");
		chain.push(chunk, limit);
		self.preview_index = chain.len() - 1;
		Ok(read)
	}

	fn fill_chunk(&mut self, chunk: &mut Chunk<N>) -> Result<usize> {
		let dst = chunk.writable_mut()
			.expect("freshly borrowed chunks are exclusively owned");
		let capacity = dst.len();
		let read = self.source.fill(dst).context(Context::Fill)?;
		assert!(read <= capacity, "fill source reported more bytes than the chunk region holds");
		chunk.commit(read);
		Ok(read)
	}

	/// Recording collapses back to the chainless state when the outermost
	/// preview exits with only the original chunk recorded.
	fn collapse_single_entry(&mut self) {
		let single = self.recorded
			.as_ref()
			.is_some_and(|chain| chain.len() == 1 && self.preview_index == 0);
		if !single {
			return;
		}
		if let Some(chain) = self.recorded.as_mut() {
			self.head = chain.discard_first();
		}
		self.recorded = None;
		self.preview_index = 0;
	}

	fn forget_empty_chain(&mut self) {
		if self.recorded.as_ref().is_some_and(RecordedChain::is_empty) {
			self.recorded = None;
			self.preview_index = 0;
		}
	}

	/// Reads a [`Pod`] value one byte at a time across chunk seams.
	fn read_pod_across_chunks<T: Pod>(&mut self) -> Result<T> {
		let mut value = T::zeroed();
		let bytes = bytemuck::bytes_of_mut(&mut value);
		let required = bytes.len();
		for slot in bytes {
			if self.window() == 0 && self.fetch_cached_or_fill().context(Context::Read)? == 0 {
				return Err(Error::end_of_input(required, Context::Read));
			}
			let chunk = self.active_chunk()
				.expect("an active chunk backs a non-empty window");
			*slot = chunk.memory().load::<u8>(self.position);
			self.position += 1;
		}
		Ok(value)
	}
}

impl<S: FillSource, const N: usize, P: Pool<N>> Drop for Input<S, N, P> {
	fn drop(&mut self) {
		if !self.closed {
			let _ = self.close();
		}
	}
}

impl<S: FillSource, const N: usize, P: Pool<N>> fmt::Debug for Input<S, N, P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Input")
			.field("position", &self.position)
			.field("limit", &self.limit)
			.field("preview_discard", &self.preview_discard)
			.field("recorded", &self.recorded.as_ref().map(RecordedChain::len))
			.field("closed", &self.closed)
			.finish_non_exhaustive()
	}
}
