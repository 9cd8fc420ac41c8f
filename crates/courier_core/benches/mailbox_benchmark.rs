//! Benchmark for mailbox round trips.
//!
//! Compares posting through a `MessageTarget` against a plain
//! crossbeam channel, with and without acknowledgements.
//!
//! Run with: cargo bench --package courier_core --bench mailbox_benchmark

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use courier_core::{AckFlags, MessageHandler, MessageTarget};

const BATCH: u64 = 1_000;

enum Command {
    Work(u64),
    Stop,
}

struct Sink {
    total: u64,
    stopped: bool,
}

impl MessageHandler<Command> for Sink {
    fn process_message(&mut self, message: Command) {
        match message {
            Command::Work(value) => self.total = self.total.wrapping_add(value),
            Command::Stop => self.stopped = true,
        }
    }
}

fn spawn_consumer(mailbox: &Arc<MessageTarget<Command>>) -> thread::JoinHandle<u64> {
    let mailbox = Arc::clone(mailbox);
    thread::spawn(move || {
        let mut sink = Sink {
            total: 0,
            stopped: false,
        };
        while !sink.stopped {
            mailbox.flush_messages(&mut sink, true);
        }
        sink.total
    })
}

fn benchmark_single_thread_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("mailbox_same_thread");
    group.throughput(Throughput::Elements(BATCH));

    group.bench_function("post_then_flush", |b| {
        let mailbox = MessageTarget::new();
        let mut sink = Sink {
            total: 0,
            stopped: false,
        };
        b.iter(|| {
            for i in 0..BATCH {
                mailbox.post_message(Command::Work(black_box(i)), AckFlags::NONE);
            }
            black_box(mailbox.flush_messages(&mut sink, false));
        });
    });

    group.finish();
}

fn benchmark_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("mailbox_cross_thread");
    group.throughput(Throughput::Elements(BATCH));

    for (name, flags) in [
        ("fire_and_forget", AckFlags::NONE),
        ("received_ack", AckFlags::RECEIVED),
        ("processed_ack", AckFlags::PROCESSED),
    ] {
        group.bench_function(name, |b| {
            let mailbox = Arc::new(MessageTarget::new());
            let consumer = spawn_consumer(&mailbox);
            b.iter(|| {
                for i in 0..BATCH {
                    mailbox.post_message(Command::Work(black_box(i)), flags);
                }
            });
            mailbox.post_message(Command::Stop, AckFlags::PROCESSED);
            black_box(consumer.join().unwrap());
        });
    }

    group.bench_function("crossbeam_unbounded", |b| {
        let (tx, rx) = crossbeam_channel::unbounded::<Command>();
        let consumer = thread::spawn(move || {
            let mut total = 0u64;
            while let Ok(Command::Work(value)) = rx.recv() {
                total = total.wrapping_add(value);
            }
            total
        });
        b.iter(|| {
            for i in 0..BATCH {
                tx.send(Command::Work(black_box(i))).unwrap();
            }
        });
        tx.send(Command::Stop).unwrap();
        black_box(consumer.join().unwrap());
    });

    group.finish();
}

criterion_group!(benches, benchmark_single_thread_flush, benchmark_cross_thread);
criterion_main!(benches);
