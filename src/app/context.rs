use crate::app::ports::{RateLimiterPort, SessionPort};
use crate::app::reconcile::CategoryMatch;
use crate::domain::UserId;
use crate::error::{ActionError, ActionResult};
use crate::metrics::ActionMetrics;
use crate::storage::Storage;
use std::sync::Arc;
use tracing::warn;

/// Everything an action needs, passed explicitly instead of reached through globals.
#[derive(Clone)]
pub struct ActionContext {
    pub storage: Arc<dyn Storage>,
    pub session: Arc<dyn SessionPort>,
    pub rate_limiter: Arc<dyn RateLimiterPort>,
    pub category_match: CategoryMatch,
}

impl ActionContext {
    pub fn new(
        storage: Arc<dyn Storage>,
        session: Arc<dyn SessionPort>,
        rate_limiter: Arc<dyn RateLimiterPort>,
    ) -> Self {
        Self {
            storage,
            session,
            rate_limiter,
            category_match: CategoryMatch::default(),
        }
    }

    pub fn with_category_match(mut self, category_match: CategoryMatch) -> Self {
        self.category_match = category_match;
        self
    }

    /// The signed-in user, for read-only queries.
    pub async fn require_user(&self) -> ActionResult<UserId> {
        self.session
            .current_user()
            .await
            .ok_or(ActionError::Unauthorized)
    }

    /// Session then quota; runs before any write of a mutating action.
    pub async fn authorize(&self, action: &'static str) -> ActionResult<UserId> {
        let user = match self.session.current_user().await {
            Some(user) => user,
            None => {
                warn!(action, "Rejected action without a session");
                return Err(ActionError::Unauthorized);
            }
        };

        if !self.rate_limiter.check_quota(&user).await {
            warn!(action, user = %user, "Rate limited");
            return Err(ActionError::RateLimited);
        }

        Ok(user)
    }
}

/// Record the outcome of an action in metrics and logs.
pub(crate) fn observe<T>(action: &'static str, result: ActionResult<T>) -> ActionResult<T> {
    match &result {
        Ok(_) => ActionMetrics::record_success(action),
        Err(e) => {
            ActionMetrics::record_error(action, e.kind());
            if let ActionError::Store(inner) = e {
                tracing::error!(action, "Store failure: {}", inner);
            }
        }
    }
    result
}
