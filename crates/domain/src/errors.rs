//! 领域模型错误定义
//!
//! `DomainError` 描述业务规则层面的失败（参数校验、权限），
//! `RepositoryError` 描述存储协作方的失败（冲突、不可用）。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 参数校验失败，不会产生任何状态变更
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 不允许对自己滑动
    #[error("cannot swipe on yourself")]
    SelfSwipe,

    #[error("user not found")]
    UserNotFound,

    #[error("match not found")]
    MatchNotFound,

    /// 操作者不是该配对的参与方
    #[error("not a participant of this match")]
    NotMatchParticipant,
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 存储层错误
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    /// 违反唯一约束（例如规范化配对重复插入）
    #[error("unique constraint violated")]
    Conflict,

    #[error("storage failure: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}
