//! 条件值与值字段
//!
//! 值字段负责把条件载荷中的原始 JSON 值反序列化为带类型的 [`ConditionValue`]，
//! 并在序列化时还原为 JSON。校验失败时返回 `InvalidValue`，此时并不知道条件下标，
//! 由上层调用方补充。

use crate::error::{ConditionError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// 条件中存储的带类型操作数
#[derive(Debug, Clone)]
pub enum ConditionValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Regex(Regex),
    List(Vec<ConditionValue>),
}

impl ConditionValue {
    /// 转换为通用的 JSON 表示
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::DateTime(dt) => Value::String(dt.to_rfc3339()),
            Self::Regex(re) => Value::String(re.as_str().to_string()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// 数值视图，整数与浮点数统一为 f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConditionValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for ConditionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            // 正则按模式文本比较
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for ConditionValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for ConditionValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for ConditionValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// 值字段：操作数的反序列化、校验与序列化
pub trait ValueField: Send + Sync {
    /// 反序列化并校验原始值
    fn deserialize_value(&self, raw: &Value) -> Result<ConditionValue>;

    /// 序列化为可写入 JSON 的原始值
    fn serialize_value(&self, value: &ConditionValue) -> Value;
}

/// 内置值字段
///
/// 可直接从配置文件中以 `{ type = "enum", options = [...] }` 的形式声明。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuiltinValueField {
    /// 字符串
    String,
    /// 浮点数，可选的上下限约束
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// 整数，可选的上下限约束
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// 布尔值
    Boolean,
    /// 枚举，值必须是 options 之一
    Enum { options: Vec<String> },
    /// 正则表达式，反序列化时即完成编译
    Regex,
    /// 日期时间，支持 RFC 3339 与 `YYYY-MM-DD`
    #[serde(rename = "datetime")]
    DateTime,
    /// 列表，元素由 item 字段处理
    List {
        item: Box<BuiltinValueField>,
        #[serde(default)]
        length: Option<usize>,
    },
}

impl BuiltinValueField {
    pub fn number() -> Self {
        Self::Number {
            min: None,
            max: None,
        }
    }

    pub fn integer() -> Self {
        Self::Integer {
            min: None,
            max: None,
        }
    }

    pub fn enumeration<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn list(item: BuiltinValueField) -> Self {
        Self::List {
            item: Box::new(item),
            length: None,
        }
    }

    fn type_error(expected: &str, raw: &Value) -> ConditionError {
        ConditionError::invalid_value_with_code(
            format!("值类型无效: 期望 {}, 实际 {}", expected, type_name(raw)),
            "invalid_type",
        )
    }

    fn check_range<T>(value: T, min: Option<T>, max: Option<T>) -> Result<()>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if let Some(min) = min.filter(|min| value < *min) {
            return Err(ConditionError::invalid_value_with_code(
                format!("值 {} 小于最小值 {}", value, min),
                "min_value",
            ));
        }

        if let Some(max) = max.filter(|max| value > *max) {
            return Err(ConditionError::invalid_value_with_code(
                format!("值 {} 大于最大值 {}", value, max),
                "max_value",
            ));
        }

        Ok(())
    }
}

impl ValueField for BuiltinValueField {
    fn deserialize_value(&self, raw: &Value) -> Result<ConditionValue> {
        if raw.is_null() {
            return Err(ConditionError::invalid_value_with_code(
                "必须提供值",
                "required",
            ));
        }

        match self {
            Self::String => match raw {
                Value::String(s) => Ok(ConditionValue::String(s.clone())),
                Value::Number(n) => Ok(ConditionValue::String(n.to_string())),
                _ => Err(Self::type_error("string", raw)),
            },
            Self::Number { min, max } => {
                let n = as_f64(raw).ok_or_else(|| Self::type_error("number", raw))?;
                Self::check_range(n, *min, *max)?;
                Ok(ConditionValue::Number(n))
            }
            Self::Integer { min, max } => {
                let i = match raw {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
                .ok_or_else(|| Self::type_error("integer", raw))?;
                Self::check_range(i, *min, *max)?;
                Ok(ConditionValue::Integer(i))
            }
            Self::Boolean => match raw {
                Value::Bool(b) => Ok(ConditionValue::Bool(*b)),
                Value::String(s) if s == "true" => Ok(ConditionValue::Bool(true)),
                Value::String(s) if s == "false" => Ok(ConditionValue::Bool(false)),
                _ => Err(Self::type_error("boolean", raw)),
            },
            Self::Enum { options } => {
                let s = raw.as_str().ok_or_else(|| Self::type_error("string", raw))?;
                if options.iter().any(|o| o == s) {
                    Ok(ConditionValue::String(s.to_string()))
                } else {
                    Err(ConditionError::invalid_value_with_code(
                        format!("\"{}\" 不是有效的选项", s),
                        "invalid_choice",
                    ))
                }
            }
            Self::Regex => {
                let pattern = raw
                    .as_str()
                    .ok_or_else(|| Self::type_error("string (regex pattern)", raw))?;
                Regex::new(pattern).map(ConditionValue::Regex).map_err(|e| {
                    ConditionError::invalid_value_with_code(
                        format!("无效的正则表达式 '{}': {}", pattern, e),
                        "invalid_regex",
                    )
                })
            }
            Self::DateTime => {
                let s = raw
                    .as_str()
                    .ok_or_else(|| Self::type_error("datetime string", raw))?;
                parse_datetime(s).map(ConditionValue::DateTime).ok_or_else(|| {
                    ConditionError::invalid_value_with_code(
                        format!("无法解析日期时间: '{}'", s),
                        "invalid_datetime",
                    )
                })
            }
            Self::List { item, length } => {
                let arr = raw.as_array().ok_or_else(|| Self::type_error("array", raw))?;

                if let Some(expected) = length.filter(|expected| arr.len() != *expected) {
                    return Err(ConditionError::invalid_value_with_code(
                        format!("列表长度应为 {}, 实际 {}", expected, arr.len()),
                        "invalid_length",
                    ));
                }

                arr.iter()
                    .enumerate()
                    .map(|(i, element)| {
                        item.deserialize_value(element).map_err(|e| match e {
                            ConditionError::InvalidValue { message, code, .. } => {
                                ConditionError::InvalidValue {
                                    message: format!("第 {} 项: {}", i, message),
                                    code,
                                    condition_index: None,
                                }
                            }
                            other => other,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(ConditionValue::List)
            }
        }
    }

    fn serialize_value(&self, value: &ConditionValue) -> Value {
        match (self, value) {
            (Self::List { item, .. }, ConditionValue::List(items)) => {
                Value::Array(items.iter().map(|v| item.serialize_value(v)).collect())
            }
            _ => value.to_json(),
        }
    }
}

/// 解析日期时间，依次尝试 RFC 3339 和纯日期格式
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// 尝试将 Value 转换为 f64，非有限值（inf、NaN）视为无法转换
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

/// 获取值的类型名称
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn code_of(err: ConditionError) -> Option<String> {
        match err {
            ConditionError::InvalidValue { code, .. } => code,
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_null_is_rejected() {
        let err = BuiltinValueField::String
            .deserialize_value(&Value::Null)
            .unwrap_err();
        assert_eq!(code_of(err).as_deref(), Some("required"));
    }

    #[test]
    fn test_enum_field() {
        let field = BuiltinValueField::enumeration(["open", "closed"]);

        assert_eq!(
            field.deserialize_value(&json!("open")).unwrap(),
            ConditionValue::from("open")
        );

        let err = field.deserialize_value(&json!("pending")).unwrap_err();
        assert!(err.to_string().contains("pending"));
        assert_eq!(code_of(err).as_deref(), Some("invalid_choice"));
    }

    #[test]
    fn test_integer_range() {
        let field = BuiltinValueField::Integer {
            min: Some(1),
            max: Some(10),
        };

        assert_eq!(
            field.deserialize_value(&json!(5)).unwrap(),
            ConditionValue::Integer(5)
        );
        assert_eq!(
            field.deserialize_value(&json!("7")).unwrap(),
            ConditionValue::Integer(7)
        );
        assert_eq!(
            code_of(field.deserialize_value(&json!(0)).unwrap_err()).as_deref(),
            Some("min_value")
        );
        assert_eq!(
            code_of(field.deserialize_value(&json!(11)).unwrap_err()).as_deref(),
            Some("max_value")
        );
        assert_eq!(
            code_of(field.deserialize_value(&json!(1.5)).unwrap_err()).as_deref(),
            Some("invalid_type")
        );
    }

    #[test]
    fn test_number_rejects_non_finite() {
        let field = BuiltinValueField::number();

        assert_eq!(
            field.deserialize_value(&json!("2.5")).unwrap(),
            ConditionValue::Number(2.5)
        );
        for raw in ["inf", "-inf", "NaN", "infinity"] {
            let err = field.deserialize_value(&json!(raw)).unwrap_err();
            assert_eq!(code_of(err).as_deref(), Some("invalid_type"), "{}", raw);
        }
    }

    #[test]
    fn test_boolean_field() {
        let field = BuiltinValueField::Boolean;
        assert_eq!(
            field.deserialize_value(&json!(true)).unwrap(),
            ConditionValue::Bool(true)
        );
        assert_eq!(
            field.deserialize_value(&json!("false")).unwrap(),
            ConditionValue::Bool(false)
        );
        assert!(field.deserialize_value(&json!(1)).is_err());
    }

    #[test]
    fn test_regex_field() {
        let field = BuiltinValueField::Regex;

        let value = field.deserialize_value(&json!(r"^\d+$")).unwrap();
        assert!(matches!(value, ConditionValue::Regex(ref re) if re.is_match("123")));
        assert_eq!(field.serialize_value(&value), json!(r"^\d+$"));

        let err = field.deserialize_value(&json!("(unclosed")).unwrap_err();
        assert_eq!(code_of(err).as_deref(), Some("invalid_regex"));
    }

    #[test]
    fn test_datetime_field() {
        let field = BuiltinValueField::DateTime;

        let value = field.deserialize_value(&json!("2024-01-15")).unwrap();
        let raw = field.serialize_value(&value);
        assert_eq!(raw, json!("2024-01-15T00:00:00+00:00"));
        assert_eq!(field.deserialize_value(&raw).unwrap(), value);

        let err = field.deserialize_value(&json!("yesterday")).unwrap_err();
        assert_eq!(code_of(err).as_deref(), Some("invalid_datetime"));
    }

    #[test]
    fn test_list_field() {
        let field = BuiltinValueField::List {
            item: Box::new(BuiltinValueField::number()),
            length: Some(2),
        };

        let value = field.deserialize_value(&json!([1, 2.5])).unwrap();
        assert_eq!(
            value,
            ConditionValue::List(vec![ConditionValue::Number(1.0), ConditionValue::Number(2.5)])
        );
        assert_eq!(field.serialize_value(&value), json!([1.0, 2.5]));

        assert_eq!(
            code_of(field.deserialize_value(&json!([1])).unwrap_err()).as_deref(),
            Some("invalid_length")
        );

        let err = field.deserialize_value(&json!([1, "x"])).unwrap_err();
        assert!(err.to_string().starts_with("第 1 项"));
    }

    #[test]
    fn test_builtin_field_serde() {
        let field: BuiltinValueField =
            serde_json::from_value(json!({"type": "enum", "options": ["a", "b"]})).unwrap();
        assert_eq!(field, BuiltinValueField::enumeration(["a", "b"]));

        let field: BuiltinValueField = serde_json::from_value(json!({
            "type": "list",
            "item": {"type": "integer", "min": 0}
        }))
        .unwrap();
        assert_eq!(
            field,
            BuiltinValueField::list(BuiltinValueField::Integer {
                min: Some(0),
                max: None
            })
        );

        let field: BuiltinValueField = serde_json::from_value(json!({"type": "datetime"})).unwrap();
        assert_eq!(field, BuiltinValueField::DateTime);
    }

    #[test]
    fn test_regex_equality_by_pattern() {
        let a = ConditionValue::Regex(Regex::new("a+").unwrap());
        let b = ConditionValue::Regex(Regex::new("a+").unwrap());
        let c = ConditionValue::Regex(Regex::new("b+").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
