// SPDX-License-Identifier: Apache-2.0

use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use pakio::pool::pool;
use pakio::Output;

fn packet(c: &mut Criterion) {
	c.bench_function("build 8KiB packet", |b| {
		let mut builder = Output::builder(pool());
		b.iter(|| {
			for i in 0..1024u64 {
				builder.write_u64(i).unwrap();
			}
			let packet = builder.build();
			black_box(packet.size());
			packet.release();
		});
	});

	c.bench_function("read 8KiB packet", |b| {
		let mut builder = Output::builder(pool());
		b.iter(|| {
			for i in 0..1024u64 {
				builder.write_u64(i).unwrap();
			}
			let mut reader = builder.build().reader();
			let mut total = 0;
			while !reader.eof().unwrap() {
				total += reader.read_u64().unwrap();
			}
			black_box(total);
		});
	});
}

criterion_group!(benches, packet);
criterion_main!(benches);
