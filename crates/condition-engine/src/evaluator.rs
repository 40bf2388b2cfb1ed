//! 内置操作符评估器
//!
//! 在条件字段提取出的运行时值与条件中存储的带类型操作数之间做比较。
//! 类型不兼容或字段缺失时返回 false，而不是报错：条件是纯谓词，匹配阶段不会失败。

use crate::operators::BuiltinOperator;
use crate::values::{ConditionValue, as_f64, parse_datetime};
use regex::Regex;
use serde_json::Value;

/// 内置操作符评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估内置操作符
    ///
    /// # Arguments
    /// * `field_value` - 条件字段从上下文中提取的值
    /// * `operator` - 操作符
    /// * `expected` - 条件中存储的操作数
    pub fn evaluate(
        field_value: Option<&Value>,
        operator: BuiltinOperator,
        expected: Option<&ConditionValue>,
    ) -> bool {
        use BuiltinOperator as Op;

        // 空值检查不需要操作数，且语义本身就是判断字段是否存在
        match operator {
            Op::IsEmpty => return Self::is_empty(field_value),
            Op::IsNotEmpty => return !Self::is_empty(field_value),
            _ => {}
        }

        // 否定类操作符严格等于对应肯定操作符取反
        if let Some(positive) = operator.negated() {
            return !Self::evaluate(field_value, positive, expected);
        }

        let (Some(field), Some(expected)) = (field_value, expected) else {
            return false;
        };

        match operator {
            Op::Is => Self::eq(field, expected),
            Op::GreaterThan => Self::compare(field, expected, |a, b| a > b),
            Op::GreaterThanOrEqual => Self::compare(field, expected, |a, b| a >= b),
            Op::LessThan => Self::compare(field, expected, |a, b| a < b),
            Op::LessThanOrEqual => Self::compare(field, expected, |a, b| a <= b),
            Op::Between => Self::between(field, expected),
            Op::OneOf => Self::one_of(field, expected),
            Op::Contains => Self::contains(field, expected),
            Op::ContainsAny => Self::contains_any(field, expected),
            Op::ContainsAll => Self::contains_all(field, expected),
            Op::StartsWith => Self::string_test(field, expected, |s, p| s.starts_with(p)),
            Op::EndsWith => Self::string_test(field, expected, |s, p| s.ends_with(p)),
            Op::MatchesRegex => Self::regex_match(field, expected),
            Op::Before => Self::time_compare(field, expected, |a, b| a < b),
            Op::After => Self::time_compare(field, expected, |a, b| a > b),
            Op::IsNot
            | Op::NotOneOf
            | Op::DoesNotContain
            | Op::DoesNotMatchRegex
            | Op::IsEmpty
            | Op::IsNotEmpty => false,
        }
    }

    /// 判断值是否为空
    fn is_empty(value: Option<&Value>) -> bool {
        match value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(arr)) => arr.is_empty(),
            Some(Value::Object(obj)) => obj.is_empty(),
            _ => false,
        }
    }

    /// 相等比较
    fn eq(field: &Value, expected: &ConditionValue) -> bool {
        match expected {
            // 两侧都是整数时精确比较，避免超过 2^53 的整数在 f64 下被视为相等
            ConditionValue::Integer(i) => match field.as_i64() {
                Some(f) => f == *i,
                None => Self::numeric_eq(field, expected.as_f64()),
            },
            ConditionValue::Number(n) => Self::numeric_eq(field, Some(*n)),
            ConditionValue::Bool(b) => field.as_bool() == Some(*b),
            // 字符串字段可能保存数字的文本形式，运行时值为数字时按数值比较
            ConditionValue::String(s) => match field {
                Value::Number(_) => Self::numeric_eq(field, s.trim().parse().ok()),
                _ => field.as_str() == Some(s.as_str()),
            },
            ConditionValue::DateTime(dt) => {
                field.as_str().and_then(parse_datetime).as_ref() == Some(dt)
            }
            ConditionValue::Regex(re) => field.as_str().is_some_and(|s| re.is_match(s)),
            ConditionValue::List(items) => match field.as_array() {
                Some(arr) => {
                    arr.len() == items.len()
                        && arr.iter().zip(items).all(|(f, e)| Self::eq(f, e))
                }
                None => false,
            },
        }
    }

    /// 整数与浮点数统一按 f64 比较（如 100 == 100.0）
    fn numeric_eq(field: &Value, expected: Option<f64>) -> bool {
        match (as_f64(field), expected) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        }
    }

    /// 数值比较
    fn compare<F>(field: &Value, expected: &ConditionValue, cmp: F) -> bool
    where
        F: Fn(f64, f64) -> bool,
    {
        match (as_f64(field), expected.as_f64()) {
            (Some(a), Some(b)) => cmp(a, b),
            _ => false,
        }
    }

    /// 范围比较 (between)，expected 应为 [min, max]
    fn between(field: &Value, expected: &ConditionValue) -> bool {
        let Some([min, max]) = expected.as_list() else {
            return false;
        };

        match (as_f64(field), min.as_f64(), max.as_f64()) {
            (Some(v), Some(min), Some(max)) => v >= min && v <= max,
            _ => false,
        }
    }

    /// 列表包含检查 (one_of)
    fn one_of(field: &Value, expected: &ConditionValue) -> bool {
        expected
            .as_list()
            .is_some_and(|items| items.iter().any(|item| Self::eq(field, item)))
    }

    /// 字符串/数组包含检查
    fn contains(field: &Value, expected: &ConditionValue) -> bool {
        match field {
            Value::String(s) => expected.as_str().is_some_and(|sub| s.contains(sub)),
            Value::Array(arr) => arr.iter().any(|item| Self::eq(item, expected)),
            _ => false,
        }
    }

    /// 数组包含任意一个 (contains_any)
    fn contains_any(field: &Value, expected: &ConditionValue) -> bool {
        match (field.as_array(), expected.as_list()) {
            (Some(arr), Some(items)) => items
                .iter()
                .any(|item| arr.iter().any(|f| Self::eq(f, item))),
            _ => false,
        }
    }

    /// 数组包含全部 (contains_all)
    fn contains_all(field: &Value, expected: &ConditionValue) -> bool {
        match (field.as_array(), expected.as_list()) {
            (Some(arr), Some(items)) => items
                .iter()
                .all(|item| arr.iter().any(|f| Self::eq(f, item))),
            _ => false,
        }
    }

    fn string_test<F>(field: &Value, expected: &ConditionValue, test: F) -> bool
    where
        F: Fn(&str, &str) -> bool,
    {
        match (field.as_str(), expected.as_str()) {
            (Some(s), Some(p)) => test(s, p),
            _ => false,
        }
    }

    /// 正则表达式匹配
    fn regex_match(field: &Value, expected: &ConditionValue) -> bool {
        let Some(s) = field.as_str() else {
            return false;
        };

        match expected {
            ConditionValue::Regex(re) => re.is_match(s),
            // 自定义值字段可能只给出模式文本
            ConditionValue::String(pattern) => {
                Regex::new(pattern).is_ok_and(|re| re.is_match(s))
            }
            _ => false,
        }
    }

    /// 时间比较
    fn time_compare<F>(field: &Value, expected: &ConditionValue, cmp: F) -> bool
    where
        F: Fn(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) -> bool,
    {
        let ConditionValue::DateTime(expected) = expected else {
            return false;
        };

        field
            .as_str()
            .and_then(parse_datetime)
            .is_some_and(|field_time| cmp(field_time, *expected))
    }
}
