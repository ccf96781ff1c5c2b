use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sqlha::gtid::GtidSet;

fn bench_parse(c: &mut Criterion) {
    let text = "3e11fa47-71ca-11e1-9e33-c80aa9429562:1-500000,\
                4d116b87-0c2a-11ee-9e33-c80aa9429562:1-200000";
    c.bench_function("gtid_parse", |b| {
        b.iter(|| GtidSet::parse(black_box(text)).unwrap())
    });
}

fn bench_contains(c: &mut Criterion) {
    let superset = GtidSet::parse("u:1-500000,v:1-200000").unwrap();
    let subset = GtidSet::parse("u:1-250000").unwrap();
    c.bench_function("gtid_contains", |b| {
        b.iter(|| black_box(&superset).contains(black_box(&subset)))
    });
}

criterion_group!(benches, bench_parse, bench_contains);
criterion_main!(benches);
