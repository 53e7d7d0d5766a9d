//! Identity context for an on-device client: who is logged in right now.

use std::sync::RwLock;

use crate::core::AppError;
use crate::models::users::CurrentUser;
use crate::services::{auth, AppContext};

/// Holds the current user between `login` and `logout`. Flows borrow the
/// identity from here instead of reading ambient storage.
#[derive(Default)]
pub struct Session {
    current: RwLock<Option<CurrentUser>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(name = "Session login", skip(self, ctx, password))]
    pub async fn login(
        &self,
        ctx: &AppContext,
        username: &str,
        password: &str,
    ) -> Result<CurrentUser, AppError> {
        let user = auth::authenticate(ctx, username, password).await?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(user.clone());
        Ok(user)
    }

    /// Always clears the identity, even after a panic while the lock was held.
    pub fn logout(&self) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn current(&self) -> Result<CurrentUser, AppError> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| AppError::unauthorized("Please log in first"))
    }
}
