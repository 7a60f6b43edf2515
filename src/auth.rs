//! Identity provider seam.
//!
//! Authentication itself belongs to an external identity provider; this
//! module only defines the trait the session talks to and an anonymous
//! provider that issues a fresh id per sign-in.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::session::Session;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in and return the user id.
    async fn sign_in(&self) -> Result<String>;

    /// Sign the current user out of the provider.
    async fn sign_out(&self, user_id: &str) -> Result<()>;
}

/// Anonymous accounts: every sign-in yields a new UUID v4.
pub struct AnonymousIdentity;

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    async fn sign_in(&self) -> Result<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn sign_out(&self, _user_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Sign in through `provider` and record the user in the session.
pub async fn sign_in(provider: &dyn IdentityProvider, session: &Session) -> Result<String> {
    let _loading = session.begin_loading();
    let user = provider.sign_in().await?;
    session.set_user(user.clone());
    session.set_new_user(true);
    info!(user = %user, "signed in");
    Ok(user)
}

/// Sign out through `provider` and reset the session's selections.
///
/// A session with no user is left untouched.
pub async fn sign_out(provider: &dyn IdentityProvider, session: &Session) -> Result<()> {
    let Some(user) = session.user_id() else {
        return Ok(());
    };
    let _loading = session.begin_loading();
    provider.sign_out(&user).await?;
    session.sign_out();
    info!(user = %user, "signed out");
    Ok(())
}
