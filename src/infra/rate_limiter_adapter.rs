use crate::app::ports::RateLimiterPort;
use crate::domain::UserId;
use async_trait::async_trait;

pub struct RateLimiterAdapter(pub crate::rate_limiter::KeyedRateLimiter);

#[async_trait]
impl RateLimiterPort for RateLimiterAdapter {
    async fn check_quota(&self, user_id: &UserId) -> bool {
        self.0.try_acquire(user_id.as_str()).await
    }
}
