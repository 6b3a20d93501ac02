use std::cell::Cell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ripple_core::{Runtime, StoreEntry};
use serde_json::json;

fn fan_out(c: &mut Criterion) {
    c.bench_function("signal_fan_out_100", |b| {
        let rt = Runtime::new();
        let (source, set_source) = rt.create_signal(0u64);
        let sink = Rc::new(Cell::new(0u64));

        for _ in 0..100 {
            let source = source.clone();
            let sink = sink.clone();
            rt.create_effect(move || sink.set(sink.get().wrapping_add(source.get())));
        }

        let mut next = 0u64;
        b.iter(|| {
            next += 1;
            set_source.set(black_box(next));
        });
    });
}

fn batched_writes(c: &mut Criterion) {
    c.bench_function("batch_10_signals", |b| {
        let rt = Runtime::new();
        let signals: Vec<_> = (0..10).map(|i| rt.create_signal(i)).collect();
        let readers: Vec<_> = signals.iter().map(|(read, _)| read.clone()).collect();
        let total = Rc::new(Cell::new(0));

        rt.create_effect({
            let total = total.clone();
            move || total.set(readers.iter().map(|r| r.get()).sum::<i32>())
        });

        b.iter(|| {
            rt.batch(|| {
                for (_, write) in &signals {
                    write.update(|v| *v += 1);
                }
            });
            black_box(total.get())
        });
    });
}

fn memo_chain(c: &mut Criterion) {
    c.bench_function("memo_chain_20", |b| {
        let rt = Runtime::new();
        let (source, set_source) = rt.create_signal(0i64);
        let mut tail = rt.create_memo(move || source.get());
        for _ in 0..20 {
            let prev = tail.clone();
            tail = rt.create_memo(move || prev.get() + 1);
        }

        let mut next = 0i64;
        b.iter(|| {
            next += 1;
            set_source.set(next);
            black_box(tail.get_untracked())
        });
    });
}

fn store_deep_write(c: &mut Criterion) {
    c.bench_function("store_deep_write", |b| {
        let rt = Runtime::new();
        let (view, _) = rt.create_store(json!({ "user": { "profile": { "age": 0 } } }));
        let profile = view
            .path("user.profile")
            .and_then(StoreEntry::into_view)
            .expect("profile is an object");

        rt.create_effect({
            let view = view.clone();
            move || {
                black_box(view.get_value("user"));
            }
        });

        let mut age = 0u64;
        b.iter(|| {
            age += 1;
            profile.set("age", age).expect("profile is writable");
        });
    });
}

criterion_group!(benches, fan_out, batched_writes, memo_chain, store_deep_write);
criterion_main!(benches);
