//! 条件引擎错误类型
//!
//! 反序列化阶段的四类校验错误（条件字段、操作符、值、匹配模式）都携带可读的消息，
//! 以及出错条件在条件集中的下标，便于表单等调用方把错误归属到具体的行。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("{message}")]
    ChoiceNotFound {
        message: String,
        choice_id: Option<String>,
        condition_index: Option<usize>,
    },

    #[error("{message}")]
    OperatorNotFound {
        message: String,
        operator_id: Option<String>,
        condition_index: Option<usize>,
    },

    #[error("{message}")]
    InvalidValue {
        message: String,
        /// 机器可读的错误码，如 `required`、`invalid_choice`
        code: Option<String>,
        condition_index: Option<usize>,
    },

    #[error("{message}")]
    InvalidMode { message: String, mode: String },

    #[error("无效的条件数据: {0}")]
    InvalidPayload(String),

    #[error("无效的条件配置: {0}")]
    InvalidConfig(String),

    #[error("{kind}已注册: {id}")]
    AlreadyRegistered { kind: &'static str, id: String },

    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConditionError {
    pub fn choice_not_found(message: impl Into<String>) -> Self {
        Self::ChoiceNotFound {
            message: message.into(),
            choice_id: None,
            condition_index: None,
        }
    }

    pub fn operator_not_found(message: impl Into<String>) -> Self {
        Self::OperatorNotFound {
            message: message.into(),
            operator_id: None,
            condition_index: None,
        }
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
            code: None,
            condition_index: None,
        }
    }

    /// 带错误码的值校验错误
    pub fn invalid_value_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
            code: Some(code.into()),
            condition_index: None,
        }
    }

    /// 构造匹配模式错误，`mode` 为展示用的原始模式文本
    pub fn invalid_mode(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        Self::InvalidMode {
            message: format!("\"{}\" 不是有效的条件模式", mode),
            mode,
        }
    }

    /// 为错误补充条件下标
    ///
    /// 值字段等下层组件并不知道自己处于条件列表的哪个位置，由持有位置信息的调用方补充。
    /// 不携带下标的错误类型原样返回。
    pub fn with_condition_index(self, index: Option<usize>) -> Self {
        match self {
            Self::ChoiceNotFound {
                message, choice_id, ..
            } => Self::ChoiceNotFound {
                message,
                choice_id,
                condition_index: index,
            },
            Self::OperatorNotFound {
                message,
                operator_id,
                ..
            } => Self::OperatorNotFound {
                message,
                operator_id,
                condition_index: index,
            },
            Self::InvalidValue { message, code, .. } => Self::InvalidValue {
                message,
                code,
                condition_index: index,
            },
            other => other,
        }
    }

    /// 出错条件在条件集中的下标（从 0 开始）
    pub fn condition_index(&self) -> Option<usize> {
        match self {
            Self::ChoiceNotFound {
                condition_index, ..
            }
            | Self::OperatorNotFound {
                condition_index, ..
            }
            | Self::InvalidValue {
                condition_index, ..
            } => *condition_index,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConditionError>;
