use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgfrag::shortcuts::{self, SelectOptions};
use pgfrag::{ALL, Fragment, Record, param, parent, sql, table};

/// SELECT * FROM t WHERE (c0 = $1 AND c1 = $2 ...) with `n` columns.
fn build_whereable(n: usize) -> Fragment {
    let record: Record = (0..n)
        .map(|i| (format!("c{i}"), i64::try_from(i).unwrap_or_default()))
        .collect();
    sql!("SELECT * FROM " {table("t")} " WHERE " {record})
}

/// `depth` fragments nested inside each other, one parameter per level.
fn build_nested(depth: usize) -> Fragment {
    (0..depth).fold(sql!("TRUE"), |inner, i| {
        sql!("(x = " {param(i64::try_from(i).unwrap_or_default())} " AND " {inner} ")")
    })
}

fn bench_whereable(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/whereable");
    for n in [1, 5, 10, 50, 100] {
        let fragment = build_whereable(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &fragment, |b, f| {
            b.iter(|| black_box(f.compile()));
        });
    }
    group.finish();
}

fn bench_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/nested");
    for depth in [1, 10, 50, 200] {
        let fragment = build_nested(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &fragment, |b, f| {
            b.iter(|| black_box(f.compile()));
        });
    }
    group.finish();
}

fn bench_lateral_select(c: &mut Criterion) {
    let posts = shortcuts::select(
        "posts",
        Record::new().set("author_id", parent("id")),
        SelectOptions::new().columns(["id", "title"]).limit(10),
    );
    let authors = shortcuts::select("authors", ALL, SelectOptions::new().lateral("posts", &posts));
    c.bench_function("compile/lateral_select", |b| {
        b.iter(|| black_box(authors.compile()));
    });
}

criterion_group!(benches, bench_whereable, bench_nested, bench_lateral_select);
criterion_main!(benches);
