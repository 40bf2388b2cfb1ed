//! 条件操作符
//!
//! 操作符从属于某个条件字段，按操作符 ID 在该字段的 [`ConditionOperators`] 中查找。

use crate::error::{ConditionError, Result};
use crate::evaluator::ConditionEvaluator;
use crate::values::{BuiltinValueField, ConditionValue, ValueField};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// 条件操作符
pub trait ConditionOperator: Send + Sync {
    /// 操作符 ID，在所属条件字段内唯一
    fn operator_id(&self) -> &str;

    /// 操作数的值字段；返回 None 表示该操作符不需要操作数
    fn value_field(&self) -> Option<&dyn ValueField>;

    /// 比较条件字段提取的值与条件中存储的操作数
    fn matches(&self, match_value: Option<&Value>, condition_value: Option<&ConditionValue>)
    -> bool;
}

impl fmt::Debug for dyn ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionOperator")
            .field("operator_id", &self.operator_id())
            .field("has_value_field", &self.value_field().is_some())
            .finish()
    }
}

/// 内置操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinOperator {
    // 通用比较
    Is,
    IsNot,

    // 数值比较
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,

    // 包含检查
    OneOf,
    NotOneOf,
    Contains,
    DoesNotContain,
    ContainsAny,
    ContainsAll,

    // 字符串操作
    StartsWith,
    EndsWith,
    MatchesRegex,
    DoesNotMatchRegex,

    // 时间操作
    Before,
    After,

    // 空值检查
    IsEmpty,
    IsNotEmpty,
}

impl BuiltinOperator {
    /// 是否需要操作数
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }

    /// 否定类操作符对应的肯定操作符
    pub fn negated(&self) -> Option<Self> {
        match self {
            Self::IsNot => Some(Self::Is),
            Self::NotOneOf => Some(Self::OneOf),
            Self::DoesNotContain => Some(Self::Contains),
            Self::DoesNotMatchRegex => Some(Self::MatchesRegex),
            _ => None,
        }
    }

    /// 未显式指定时使用的值字段
    pub fn default_value_field(&self) -> Option<BuiltinValueField> {
        let field = match self {
            Self::IsEmpty | Self::IsNotEmpty => return None,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual => {
                BuiltinValueField::number()
            }
            Self::Between => BuiltinValueField::List {
                item: Box::new(BuiltinValueField::number()),
                length: Some(2),
            },
            Self::OneOf | Self::NotOneOf | Self::ContainsAny | Self::ContainsAll => {
                BuiltinValueField::list(BuiltinValueField::String)
            }
            Self::MatchesRegex | Self::DoesNotMatchRegex => BuiltinValueField::Regex,
            Self::Before | Self::After => BuiltinValueField::DateTime,
            Self::Is
            | Self::IsNot
            | Self::Contains
            | Self::DoesNotContain
            | Self::StartsWith
            | Self::EndsWith => BuiltinValueField::String,
        };

        Some(field)
    }

    /// 值字段类型是否适用于该操作符
    ///
    /// 判断依据是评估器能否用该字段产生的操作数做出有意义的比较。
    pub fn accepts_value_field(&self, field: &BuiltinValueField) -> bool {
        use BuiltinValueField as F;

        let numeric = |f: &BuiltinValueField| matches!(f, F::Number { .. } | F::Integer { .. });

        match self {
            Self::IsEmpty | Self::IsNotEmpty => false,
            Self::Is | Self::IsNot | Self::Contains | Self::DoesNotContain => true,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual => {
                numeric(field)
            }
            Self::Between => {
                matches!(field, F::List { item, length: Some(2) } if numeric(&**item))
            }
            Self::OneOf | Self::NotOneOf | Self::ContainsAny | Self::ContainsAll => {
                matches!(field, F::List { .. })
            }
            Self::StartsWith | Self::EndsWith => matches!(field, F::String | F::Enum { .. }),
            Self::MatchesRegex | Self::DoesNotMatchRegex => matches!(field, F::Regex | F::String),
            Self::Before | Self::After => matches!(field, F::DateTime),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanOrEqual => "greater_than_or_equal",
            Self::LessThan => "less_than",
            Self::LessThanOrEqual => "less_than_or_equal",
            Self::Between => "between",
            Self::OneOf => "one_of",
            Self::NotOneOf => "not_one_of",
            Self::Contains => "contains",
            Self::DoesNotContain => "does_not_contain",
            Self::ContainsAny => "contains_any",
            Self::ContainsAll => "contains_all",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::MatchesRegex => "matches_regex",
            Self::DoesNotMatchRegex => "does_not_match_regex",
            Self::Before => "before",
            Self::After => "after",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
        }
    }
}

impl fmt::Display for BuiltinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 基于内置操作符的标准实现
///
/// 默认 ID 与值字段由操作符类型决定，均可覆盖。
pub struct StandardOperator {
    operator_id: String,
    kind: BuiltinOperator,
    value_field: Option<Box<dyn ValueField>>,
}

impl StandardOperator {
    pub fn new(kind: BuiltinOperator) -> Self {
        Self {
            operator_id: kind.to_string(),
            kind,
            value_field: kind
                .default_value_field()
                .map(|f| Box::new(f) as Box<dyn ValueField>),
        }
    }

    pub fn with_id(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = operator_id.into();
        self
    }

    pub fn with_value_field(mut self, field: impl ValueField + 'static) -> Self {
        self.value_field = Some(Box::new(field));
        self
    }

    /// 移除值字段，使操作符不再接受操作数
    pub fn without_value_field(mut self) -> Self {
        self.value_field = None;
        self
    }

    pub fn kind(&self) -> BuiltinOperator {
        self.kind
    }
}

impl ConditionOperator for StandardOperator {
    fn operator_id(&self) -> &str {
        &self.operator_id
    }

    fn value_field(&self) -> Option<&dyn ValueField> {
        self.value_field.as_deref()
    }

    fn matches(
        &self,
        match_value: Option<&Value>,
        condition_value: Option<&ConditionValue>,
    ) -> bool {
        ConditionEvaluator::evaluate(match_value, self.kind, condition_value)
    }
}

impl fmt::Debug for StandardOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardOperator")
            .field("operator_id", &self.operator_id)
            .field("kind", &self.kind)
            .field("has_value_field", &self.value_field.is_some())
            .finish()
    }
}

/// 条件字段的操作符注册表，保持注册顺序
#[derive(Clone, Default)]
pub struct ConditionOperators {
    operators: Vec<Arc<dyn ConditionOperator>>,
}

impl ConditionOperators {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册操作符，ID 重复时返回错误
    pub fn register(&mut self, operator: Arc<dyn ConditionOperator>) -> Result<()> {
        if self.contains(operator.operator_id()) {
            warn!(operator_id = operator.operator_id(), "操作符重复注册");
            return Err(ConditionError::AlreadyRegistered {
                kind: "操作符",
                id: operator.operator_id().to_string(),
            });
        }

        self.operators.push(operator);
        Ok(())
    }

    /// 注册或替换同 ID 的操作符
    pub fn replace(&mut self, operator: Arc<dyn ConditionOperator>) {
        match self
            .operators
            .iter()
            .position(|op| op.operator_id() == operator.operator_id())
        {
            Some(pos) => self.operators[pos] = operator,
            None => self.operators.push(operator),
        }
    }

    /// 按 ID 查找操作符
    pub fn get_operator(&self, operator_id: &str) -> Result<Arc<dyn ConditionOperator>> {
        self.operators
            .iter()
            .find(|op| op.operator_id() == operator_id)
            .cloned()
            .ok_or_else(|| {
                ConditionError::operator_not_found(format!("未找到操作符: {}", operator_id))
            })
    }

    pub fn contains(&self, operator_id: &str) -> bool {
        self.operators
            .iter()
            .any(|op| op.operator_id() == operator_id)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// 按注册顺序遍历操作符
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ConditionOperator>> {
        self.operators.iter()
    }
}

impl fmt::Debug for ConditionOperators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.operators.iter().map(|op| op.operator_id()))
            .finish()
    }
}
