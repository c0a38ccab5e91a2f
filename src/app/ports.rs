use crate::domain::UserId;
use async_trait::async_trait;

/// Auth collaborator: who is calling, if anyone.
#[async_trait]
pub trait SessionPort: Send + Sync {
    async fn current_user(&self) -> Option<UserId>;
}

/// Admission gate consulted once at the start of every mutating action.
#[async_trait]
pub trait RateLimiterPort: Send + Sync {
    async fn check_quota(&self, user_id: &UserId) -> bool;
}
