//! 条件引擎
//!
//! 提供可序列化的条件规则匹配能力，支持：
//! - 条件（条件字段 + 操作符 + 值）与条件集（all/any）的构造与匹配
//! - JSON 载荷的反序列化校验与序列化
//! - 可注入的条件字段/操作符/值字段注册表
//! - 从配置文件声明条件字段

pub mod choices;
pub mod conditions;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod operators;
pub mod values;

pub use choices::{ChoiceRegistry, ConditionChoice, ConditionChoices, FieldChoice};
pub use conditions::{Condition, ConditionSet};
pub use crate::config::{ChoiceConfig, ChoicesConfig, OperatorConfig};
pub use error::{ConditionError, Result};
pub use evaluator::ConditionEvaluator;
pub use models::{ConditionMode, EvaluationContext};
pub use operators::{BuiltinOperator, ConditionOperator, ConditionOperators, StandardOperator};
pub use values::{BuiltinValueField, ConditionValue, ValueField};
