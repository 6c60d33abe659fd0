use std::future::Future;
use std::time::Duration;

use crate::error::ApplicationError;

/// 请求级期限：一次操作内的全部存储调用共享同一个超时
#[derive(Debug, Clone, Copy)]
pub struct RequestTimeout(Duration);

impl RequestTimeout {
    pub const DEFAULT: Duration = Duration::from_secs(10);

    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// 超时后放弃并丢弃内部 future，已提交的子步骤保持原样
    pub async fn run<T, F>(&self, operation: F) -> Result<T, ApplicationError>
    where
        F: Future<Output = Result<T, ApplicationError>>,
    {
        match tokio::time::timeout(self.0, operation).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.0.as_millis() as u64, "存储调用超时");
                Err(ApplicationError::Timeout(self.0))
            }
        }
    }
}

impl Default for RequestTimeout {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}
