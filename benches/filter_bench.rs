use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rulegrid::*;

fn make_dataset(rows: usize) -> Dataset {
    let schema = FieldSchemaBuilder::new()
        .field("lastName", "Last Name", DataType::String)
        .field("age", "Age", DataType::Number)
        .field("created", "Created", DataType::Date)
        .field("preferences", "Preferences", DataType::Array(ElementType::String))
        .build();
    let prefs = ["dark mode", "privacy mode", "auto upload", "notifications"];
    let records = (0..rows)
        .map(|i| {
            [
                ("lastName", Value::from(format!("name{i}"))),
                ("age", Value::from((i % 60) as i64)),
                ("created", Value::from(format!("2023-{:02}-{:02}", i % 12 + 1, i % 28 + 1))),
                ("preferences", Value::from(vec![prefs[i % 4], prefs[(i + 1) % 4]])),
            ]
            .into_iter()
            .collect()
        })
        .collect();
    Dataset::new(schema, records)
}

fn make_query() -> Query {
    let built = Query::new()
        .add_rule(0)
        .and_then(|q| q.update_rule(0, &[0], Rule::new("age", Operator::Between, RuleValue::list([20, 40]))))
        .and_then(|q| q.add_rule(0))
        .and_then(|q| q.update_rule(0, &[1], Rule::new("preferences", Operator::Contains, "dark mode")))
        .map(|q| q.add_group())
        .and_then(|q| q.add_rule(1))
        .and_then(|q| q.update_rule(1, &[0], Rule::new("created", Operator::Before, "2023-06-01")))
        .and_then(|q| q.toggle_combinator(0));
    match built {
        Ok(query) => query,
        Err(e) => panic!("bench query: {e}"),
    }
}

fn bench_compile_evaluate(c: &mut Criterion) {
    let dataset = make_dataset(1_000);
    let query = make_query();
    let compiler = SqlCompiler::new(dataset.schema());

    c.bench_function("compile", |b| {
        b.iter(|| {
            let _ = compiler.compile(black_box(&query));
        })
    });
    c.bench_function("filter_compatible", |b| {
        b.iter(|| {
            let _ = dataset.filter(black_box(&query), "", EvalMode::Compatible);
        })
    });
    c.bench_function("filter_strict_with_search", |b| {
        b.iter(|| {
            let _ = dataset.filter(black_box(&query), black_box("name1"), EvalMode::Strict);
        })
    });
}

criterion_group!(benches, bench_compile_evaluate);
criterion_main!(benches);
