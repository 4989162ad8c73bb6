use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use kv_bridge::{
    common::Parameter,
    dispatch::execute,
    request::normalize,
    store::{
        resp::{encode, read_value, RespValue},
        Connector, MemoryConnector, Target,
    },
};
use rand::{distributions::Uniform, thread_rng, Rng};
use std::{io::Cursor, time::Duration};

fn random_data(count: usize, max_length: usize) -> Vec<String> {
    let mut input = Vec::with_capacity(count);
    for _ in 0..count {
        let len = thread_rng().gen_range(1..=max_length);
        input.push(
            thread_rng()
                .sample_iter(Uniform::new(char::from(33), char::from(126)))
                .take(len)
                .map(char::from)
                .collect(),
        );
    }

    input
}

fn params(action: &str, key: &str, value: &str) -> Vec<Parameter> {
    vec![
        Parameter::new("addr", "127.0.0.1:6379"),
        Parameter::new("Action", action),
        Parameter::new("KEY", key),
        Parameter::new("value", value),
        Parameter::new("expiration", "60"),
        Parameter::new("unknown", "ignored"),
    ]
}

fn bench_normalize(c: &mut Criterion) {
    const DATA_COUNT: usize = 100;
    const MAX_LENGTH: usize = 1000;

    let key = random_data(DATA_COUNT, MAX_LENGTH);
    let value = random_data(DATA_COUNT, MAX_LENGTH);
    let inputs: Vec<Vec<Parameter>> = (0..DATA_COUNT)
        .map(|i| params("set", &key[i], &value[i]))
        .collect();

    c.bench_function("normalize", |b| {
        b.iter(|| {
            for input in &inputs {
                normalize(input).unwrap();
            }
        })
    });
}

fn bench_execute(c: &mut Criterion) {
    const DATA_COUNT: usize = 100;
    const MAX_LENGTH: usize = 1000;

    let key = random_data(DATA_COUNT, MAX_LENGTH);
    let value = random_data(DATA_COUNT, MAX_LENGTH);
    let sets: Vec<_> = (0..DATA_COUNT)
        .map(|i| normalize(&params("set", &key[i], &value[i])).unwrap())
        .collect();
    let gets: Vec<_> = (0..DATA_COUNT)
        .map(|i| normalize(&params("get", &key[i], "")).unwrap())
        .collect();

    let mut group = c.benchmark_group("bench_execute");
    group.bench_function("memory_set_get", |b| {
        b.iter_batched(
            || {
                MemoryConnector::new()
                    .connect(&Target::new("127.0.0.1"))
                    .unwrap()
            },
            |mut store| {
                for request in sets.iter().chain(&gets) {
                    execute(request, &mut store).unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_resp(c: &mut Criterion) {
    const DATA_COUNT: usize = 1000;
    const MAX_LENGTH: usize = 100;

    let keys = random_data(DATA_COUNT, MAX_LENGTH);
    let reply = RespValue::Array(Some(keys.into_iter().map(RespValue::bulk).collect()));
    let mut wire = BytesMut::new();
    encode(&reply, &mut wire);
    let wire = wire.freeze();

    let mut group = c.benchmark_group("bench_resp");
    group.bench_function("encode_keys_reply", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(wire.len());
            encode(&reply, &mut buf);
            buf
        })
    });
    group.bench_function("decode_keys_reply", |b| {
        b.iter(|| read_value(&mut Cursor::new(&wire[..])).unwrap())
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = bench_normalize, bench_execute, bench_resp
);
criterion_main!(benches);
