// SPDX-License-Identifier: Apache-2.0

//! ## How it works
//!
//! Data moves through reusable fixed-size chunks of memory. Chunks are borrowed
//! from a *pool* and returned to it when consumed; when the pool is exhausted,
//! fresh memory is allocated, and recycled memory beyond the pool's retention
//! cap is dropped. The default pool is lock-free and shared process-wide, so
//! readers and writers on different threads draw from the same free list.
//!
//! ### Reading
//!
//! An [`Input`] pulls bytes from a [`FillSource`] one chunk at a time and
//! parses primitives out of the active chunk directly, falling back to a
//! byte-at-a-time path across chunk seams. [`Input::preview`] opens a
//! non-destructive lookahead session: chunks visited while the session is open
//! are retained in a recorded chain and replayed once the session exits, so
//! the bytes seen inside are yielded again outside. Sessions nest; only the
//! outermost owns the recorded chain. [`Input::prefetch`] pulls chunks ahead
//! of the cursor without consuming them.
//!
//! ### Writing
//!
//! An [`Output`] appends bytes, primitives, and UTF-8 text across a chain of
//! chunks, then either flushes the chain to a [`FlushSink`] or, in the
//! [`PacketBuilder`] flavour, freezes it into an immutable [`Packet`] in
//! constant time. Packets are cheap to [`copy`](Packet::copy) (chunks are
//! shared, not duplicated) and are consumed exactly once as an `Input`,
//! closing the loop. Writing one packet into another builder splices chains
//! without copying, merging small boundary chunks into reserved gap space
//! instead.

mod chunk;
mod error;
mod input;
mod output;
mod packet;
pub mod pool;
mod std_io;
mod void;

pub use chunk::*;
pub use error::*;
pub use input::*;
pub use output::*;
pub use packet::*;
pub use std_io::*;
pub use void::*;

/// The default chunk capacity in bytes.
pub const SIZE: usize = 4096;
