use std::time::Duration;

use domain::{DomainError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    /// 请求级超时，存储调用未在期限内完成
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("authentication failed")]
    Authentication,
}

impl ApplicationError {
    /// 调用方可自行决定是否重试（核心内部从不自动重试）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApplicationError::Timeout(_) | ApplicationError::Repository(RepositoryError::Storage { .. })
        )
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
