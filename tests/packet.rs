// SPDX-License-Identifier: Apache-2.0

#[macro_use]
mod common;

use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use pretty_assertions::assert_eq;
use pakio::{Output, PacketBuilder};
use common::CountingPool;

fn builder() -> (PacketBuilder<4096, CountingPool>, CountingPool) {
	let pool = CountingPool::new();
	(Output::builder(pool.clone()), pool)
}

#[test]
fn built_bytes_read_back_as_int() {
	let (mut builder, pool) = builder();
	builder.write_from_slice(&[1, 2, 3, 4]).unwrap();

	let packet = builder.build();
	assert_eq!(packet.size(), 4);

	let mut reader = packet.reader();
	assert_eq!(reader.read_u32().unwrap(), 0x0102_0304);
	assert!(reader.eof().unwrap());
	reader.close().unwrap();
	drop(builder);
	assert!(pool.is_balanced());
}

#[test]
fn little_endian_int_lays_reversed_bytes() {
	let (mut builder, _) = builder();
	builder.write_u32_le(0x0102_0304).unwrap();

	let mut reader = builder.build().reader();
	let mut bytes = [0; 4];
	reader.read_fully(&mut bytes).unwrap();
	assert_eq!(bytes, [4, 3, 2, 1]);
}

#[test]
fn empty_build_yields_empty_packet() {
	let (mut builder, pool) = builder();
	let packet = builder.build();
	assert!(packet.is_empty());

	let mut reader = packet.reader();
	assert!(reader.eof().unwrap());
	assert!(reader.read_u8().unwrap_err().is_end_of_input());
	drop(reader);
	drop(builder);
	assert!(pool.is_balanced());
}

#[test]
fn builder_is_reusable_after_build() {
	let (mut builder, pool) = builder();
	builder.write_utf8("first").unwrap();
	let first = builder.build();
	builder.write_utf8("second").unwrap();
	let second = builder.build();

	assert_eq!(first.reader().read_utf8(5).unwrap(), "first");
	assert_eq!(second.reader().read_utf8(6).unwrap(), "second");
	drop(builder);
	assert!(pool.is_balanced());
}

#[test]
fn repeated_append_spans_many_chunks() {
	let (mut builder, pool) = builder();
	for _ in 0..10_000 {
		builder.write_utf8("ABC.").unwrap();
	}
	assert_eq!(builder.size(), 40_000);

	let packet = builder.build();
	assert_eq!(packet.size(), 40_000);
	assert!(packet.size() > 4096, "the chain must span multiple chunks");

	let mut reader = packet.reader();
	let text = reader.read_utf8(40_000).unwrap();
	assert_eq!(text.len(), 40_000);
	assert!(text.as_bytes().chunks(4).all(|quad| quad == b"ABC."));
	assert!(reader.eof().unwrap());

	reader.close().unwrap();
	drop(builder);
	assert!(pool.is_balanced());
}

#[test]
fn copy_shares_chunks_and_reads_independently() {
	let (mut builder, pool) = builder();
	builder.write_utf8("shared bytes").unwrap();
	let original = builder.build();
	let copied = original.copy();

	let mut first = original.reader();
	let mut second = copied.reader();
	assert_eq!(first.read_utf8(12).unwrap(), "shared bytes");
	assert_eq!(second.read_utf8(12).unwrap(), "shared bytes");

	drop(first);
	drop(second);
	drop(builder);
	assert!(pool.is_balanced());
}

#[test]
fn release_discards_without_reading() {
	let (mut builder, pool) = builder();
	builder.fill_bytes(0xFF, 10_000).unwrap();
	let packet = builder.build();
	packet.release();
	drop(builder);
	assert!(pool.is_balanced());
}

#[test]
fn floats_round_trip() {
	let (mut builder, _) = builder();
	builder.write_f32(1.5).unwrap();
	builder.write_f64(-2.25).unwrap();
	builder.write_f32_le(3.75).unwrap();
	builder.write_f64_le(0.125).unwrap();

	let mut reader = builder.build().reader();
	assert_eq!(reader.read_f32().unwrap(), 1.5);
	assert_eq!(reader.read_f64().unwrap(), -2.25);
	assert_eq!(reader.read_f32_le().unwrap(), 3.75);
	assert_eq!(reader.read_f64_le().unwrap(), 0.125);
}

#[quickcheck]
fn bytes_round_trip(bytes: Vec<u8>) -> TestResult {
	let (mut builder, _) = builder();
	if builder.write_from_slice(&bytes).is_err() {
		return TestResult::failed();
	}

	let mut reader = builder.build().reader();
	let mut read = vec![0; bytes.len()];
	if reader.read_fully(&mut read).is_err() {
		return TestResult::failed();
	}
	qc_assert_eq!(bytes, read)
}

#[quickcheck]
fn big_endian_ints_round_trip(value: u32) -> TestResult {
	let (mut builder, _) = builder();
	builder.write_u32(value).unwrap();
	let mut reader = builder.build().reader();
	qc_assert_eq!(reader.read_u32().unwrap(), value)
}

#[quickcheck]
fn little_endian_ints_round_trip(value: u32) -> TestResult {
	let (mut builder, _) = builder();
	builder.write_u32_le(value).unwrap();
	let mut reader = builder.build().reader();
	qc_assert_eq!(reader.read_u32_le().unwrap(), value)
}

#[quickcheck]
fn signed_longs_round_trip(value: i64) -> TestResult {
	let (mut builder, _) = builder();
	builder.write_i64(value).unwrap();
	builder.write_i64_le(value).unwrap();
	let mut reader = builder.build().reader();
	let be = reader.read_i64().unwrap();
	let le = reader.read_i64_le().unwrap();
	qc_assert_eq!((be, le), (value, value))
}

#[quickcheck]
fn utf8_round_trips(text: String) -> TestResult {
	let (mut builder, _) = builder();
	builder.write_utf8(&text).unwrap();
	let mut reader = builder.build().reader();
	qc_assert_eq!(reader.read_utf8(text.len()).unwrap(), text)
}

#[quickcheck]
fn char_append_matches_string_encoding(text: String) -> TestResult {
	let (mut builder, _) = builder();
	builder.append_chars(text.chars()).unwrap();

	let mut reader = builder.build().reader();
	let mut read = vec![0; text.len()];
	if reader.read_fully(&mut read).is_err() {
		return TestResult::failed();
	}
	qc_assert_eq!(read, text.as_bytes().to_vec())
}
