//! 条件集性能基准测试
//!
//! 覆盖反序列化、序列化以及 all/any 两种模式下的匹配。

use condition_engine::{
    BuiltinOperator, BuiltinValueField, ConditionChoices, ConditionSet, EvaluationContext,
    FieldChoice, StandardOperator,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::hint::black_box;

fn create_choices() -> ConditionChoices {
    let choices = ConditionChoices::new();
    choices
        .register(
            FieldChoice::new("status")
                .with_operator(
                    StandardOperator::new(BuiltinOperator::Is)
                        .with_value_field(BuiltinValueField::enumeration(["open", "closed"])),
                )
                .with_operator(StandardOperator::new(BuiltinOperator::IsEmpty)),
        )
        .unwrap();
    choices
        .register(
            FieldChoice::new("amount")
                .with_path("order.amount")
                .with_operator(StandardOperator::new(BuiltinOperator::GreaterThanOrEqual))
                .with_operator(StandardOperator::new(BuiltinOperator::Between)),
        )
        .unwrap();
    choices
        .register(
            FieldChoice::new("email")
                .with_path("user.email")
                .with_operator(StandardOperator::new(BuiltinOperator::MatchesRegex)),
        )
        .unwrap();
    choices
}

/// 构造包含 n 个条件的载荷，最后一个条件不匹配
fn create_payload(mode: &str, n: usize) -> Value {
    let mut conditions: Vec<Value> = (0..n.saturating_sub(1))
        .map(|i| match i % 3 {
            0 => json!({"choice": "status", "op": "is", "value": "open"}),
            1 => json!({"choice": "amount", "op": "between", "value": [100, 5000]}),
            _ => json!({"choice": "email", "op": "matches_regex", "value": r"@example\.com$"}),
        })
        .collect();
    conditions.push(json!({"choice": "amount", "op": "greater_than_or_equal", "value": 1_000_000}));

    json!({"mode": mode, "conditions": conditions})
}

fn create_context() -> EvaluationContext {
    EvaluationContext::new(json!({
        "status": "open",
        "order": {"amount": 1500},
        "user": {"email": "alice@example.com"}
    }))
}

fn bench_deserialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize");
    let choices = create_choices();

    for n in [1usize, 10, 50] {
        let payload = create_payload("all", n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &payload, |b, payload| {
            b.iter(|| ConditionSet::deserialize(black_box(&choices), black_box(payload)))
        });
    }

    group.finish();
}

fn bench_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("matches");
    let choices = create_choices();
    let ctx = create_context();

    for mode in ["all", "any"] {
        for n in [1usize, 10, 50] {
            let set = ConditionSet::deserialize(&choices, &create_payload(mode, n)).unwrap();
            group.bench_with_input(
                BenchmarkId::new(mode, n),
                &set,
                |b, set| b.iter(|| set.matches(black_box(&ctx))),
            );
        }
    }

    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let choices = create_choices();
    let set = ConditionSet::deserialize(&choices, &create_payload("any", 50)).unwrap();

    c.bench_function("serialize_50", |b| b.iter(|| black_box(&set).serialize()));
}

criterion_group!(benches, bench_deserialize, bench_matches, bench_serialize);
criterion_main!(benches);
