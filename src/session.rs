//! Session context passed into every cache call.

use crate::records::OwnerId;
use uuid::Uuid;

/// Who the current caller is, as far as local storage is concerned.
///
/// A known owner scopes cache keys as `user_<owner>`; before sign-in the
/// session id scopes them instead so nothing lands in a global key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    owner: Option<OwnerId>,
    session_id: String,
}

impl SessionContext {
    /// Signed-in session.
    pub fn for_owner(owner: OwnerId) -> Self {
        Self {
            owner: Some(owner),
            session_id: new_session_id(),
        }
    }

    /// Session with no owner yet.
    pub fn anonymous() -> Self {
        Self {
            owner: None,
            session_id: new_session_id(),
        }
    }

    /// Resume a known anonymous session.
    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            owner: None,
            session_id: session_id.into(),
        }
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        self.owner.as_ref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Cache namespace for this session.
    pub fn namespace(&self) -> String {
        match &self.owner {
            Some(owner) => format!("user_{}", owner),
            None => format!("session_{}", self.session_id),
        }
    }

    /// Same session after sign-in.
    pub fn signed_in(&self, owner: OwnerId) -> Self {
        Self {
            owner: Some(owner),
            session_id: self.session_id.clone(),
        }
    }
}

fn new_session_id() -> String {
    format!("temp_{}", Uuid::new_v4().simple())
}
