use domain::{DomainError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("authorization failed")]
    Authorization,
}

impl ApplicationError {
    /// 是否是状态冲突（认领竞争失败、工单已关闭等）。
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            ApplicationError::Domain(DomainError::StateConflict { .. })
        )
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
