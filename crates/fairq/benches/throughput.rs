use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fairq::{Batch, Item, Queue, QueueSet};
use std::thread;

const MSGS: u64 = 100_000;
const PAYLOAD: usize = 64;

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(MSGS));

    group.bench_function("enqueue_dequeue", |b| {
        b.iter(|| {
            let queue = Queue::<()>::new();

            let producer = {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..MSGS {
                        let mut item = Item::alloc(PAYLOAD);
                        item[..8].copy_from_slice(&i.to_le_bytes());
                        queue.enqueue(1, item).unwrap();
                    }
                })
            };

            let mut received = 0u64;
            while received < MSGS {
                match queue.dequeue() {
                    Some((_, item)) => {
                        black_box(&item[..8]);
                        received += 1;
                    }
                    None => std::hint::spin_loop(),
                }
            }
            producer.join().unwrap();
        });
    });

    group.bench_function("enqueue_drain", |b| {
        b.iter(|| {
            let queue = Queue::<()>::new();

            let producer = {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..MSGS {
                        let mut item = Item::alloc(PAYLOAD);
                        item[..8].copy_from_slice(&i.to_le_bytes());
                        queue.enqueue(1, item).unwrap();
                    }
                })
            };

            let mut batch = Batch::new();
            let mut received = 0u64;
            while received < MSGS {
                let n = queue.drain(&mut batch);
                if n == 0 {
                    std::hint::spin_loop();
                    continue;
                }
                while let Some((_, item)) = batch.next() {
                    black_box(&item[..8]);
                }
                batch.clear();
                received += n as u64;
            }
            producer.join().unwrap();
        });
    });

    group.finish();
}

fn bench_qset(c: &mut Criterion) {
    let mut group = c.benchmark_group("qset");

    for num_queues in [2usize, 4, 8] {
        let total = MSGS;
        group.throughput(Throughput::Elements(total));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}q_poll_batch", num_queues)),
            &num_queues,
            |b, &n| {
                b.iter(|| {
                    let set = QueueSet::<usize>::new();
                    let queues: Vec<Queue<usize>> = (0..n).map(|_| Queue::new()).collect();
                    for (i, queue) in queues.iter().enumerate() {
                        set.affiliate(queue, i).unwrap();
                    }

                    let per_queue = total / n as u64;
                    let mut handles = Vec::new();
                    for queue in &queues {
                        let queue = queue.clone();
                        handles.push(thread::spawn(move || {
                            for i in 0..per_queue {
                                let mut item = Item::alloc(PAYLOAD);
                                item[..8].copy_from_slice(&i.to_le_bytes());
                                queue.enqueue(1, item).unwrap();
                            }
                        }));
                    }

                    let mut batch = Batch::new();
                    let mut received = 0u64;
                    let expected = per_queue * n as u64;
                    while received < expected {
                        match set.poll_batch(&mut batch) {
                            Some((got, _)) => {
                                while let Some((_, item)) = batch.next() {
                                    black_box(&item[..8]);
                                }
                                batch.clear();
                                received += got as u64;
                            }
                            None => std::hint::spin_loop(),
                        }
                    }
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_queue, bench_qset);
criterion_main!(benches);
