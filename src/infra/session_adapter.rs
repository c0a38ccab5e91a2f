use crate::app::ports::SessionPort;
use crate::domain::UserId;
use async_trait::async_trait;

/// Header set by the authenticating proxy in front of the HTTP surface.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Session resolved once per request, before any action runs.
#[derive(Debug, Clone, Default)]
pub struct RequestSession {
    user: Option<UserId>,
}

impl RequestSession {
    pub fn authenticated(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    /// Blank or missing header values count as anonymous.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(id) if !id.is_empty() => Self::authenticated(UserId::new(id)),
            _ => Self::anonymous(),
        }
    }
}

#[async_trait]
impl SessionPort for RequestSession {
    async fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }
}
