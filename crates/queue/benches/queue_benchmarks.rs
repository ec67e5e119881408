use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;

use gympoint_queue::jobs::{JobQueue, JobRegistry, JobWorker, RetryPolicy};
use gympoint_queue::{InMemoryJobStore, JobStore};

fn payload(i: usize) -> serde_json::Value {
    json!({
        "student": { "name": format!("Student {i}"), "email": format!("s{i}@gym.test") },
        "question": "Can I change my plan?",
        "answer": "Yes, at the front desk.",
        "answer_at": "2024-01-10T10:00:00Z",
    })
}

fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("in_memory", |b| {
        let queue = JobQueue::new(InMemoryJobStore::new());
        let mut i = 0;
        b.iter(|| {
            i += 1;
            black_box(queue.enqueue_value("AnswerMail", payload(i)).unwrap());
        });
    });

    group.finish();
}

fn bench_enqueue_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_and_drain");

    for size in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut registry = JobRegistry::new();
            registry
                .register("AnswerMail", |p: &serde_json::Value| -> anyhow::Result<()> {
                    black_box(p);
                    Ok(())
                })
                .unwrap();
            let registry = registry.into_shared();

            b.iter(|| {
                let store = Arc::new(InMemoryJobStore::with_policy(
                    RetryPolicy::fixed(3, Duration::ZERO),
                    Duration::from_secs(30),
                ));
                let queue = JobQueue::new(store.clone());
                for i in 0..size {
                    queue.enqueue_value("AnswerMail", payload(i)).unwrap();
                }

                let worker = JobWorker::new("bench", store.clone(), registry.clone());
                let processed = worker.drain().unwrap();
                assert_eq!(processed, size);
                black_box(store.stats().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_enqueue, bench_enqueue_and_drain);
criterion_main!(benches);
