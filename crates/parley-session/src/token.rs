//! Token acquisition: the [`TokenSupplier`] trait and a per-identity cache.
//!
//! Parley doesn't issue tokens itself. Your backend does (it holds the
//! messaging service's secret and signs a short-lived token for the
//! signed-in user). The session manager only needs a way to ask for one,
//! which is what this trait describes.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use parley_protocol::{Identity, SessionToken, UserId};

use crate::TokenFetchError;

/// Fetches a session token for an identity.
///
/// # Example
///
/// ```rust
/// use parley_protocol::{Identity, SessionToken};
/// use parley_session::{TokenFetchError, TokenSupplier};
///
/// /// Hands out a fixed development token. Never ship this.
/// struct DevTokens;
///
/// impl TokenSupplier for DevTokens {
///     async fn fetch_token(
///         &self,
///         identity: &Identity,
///     ) -> Result<SessionToken, TokenFetchError> {
///         Ok(SessionToken::new(format!("dev-{}", identity.id)))
///     }
/// }
/// ```
pub trait TokenSupplier: Send + Sync + 'static {
    /// Requests a token bound to `identity`.
    ///
    /// Implementations must never return a token minted for a different
    /// identity.
    fn fetch_token(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<SessionToken, TokenFetchError>> + Send;

    /// Forgets any token held for `user`.
    ///
    /// The session manager calls this when the backend rejects a token
    /// as unauthorized, so the next observation fetches a fresh one.
    /// Suppliers without a cache can ignore it.
    fn invalidate(&self, _user: &UserId) {}
}

/// Wraps a [`TokenSupplier`] and reuses its token while the user stays
/// the same.
///
/// Only one entry is kept. A request for a different user id replaces
/// it, so a token can never leak from one identity to the next.
pub struct CachedTokenSupplier<S> {
    inner: S,
    cached: Mutex<Option<(UserId, SessionToken)>>,
}

impl<S: TokenSupplier> CachedTokenSupplier<S> {
    /// Creates an empty cache in front of `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }

    /// Drops the cached token, whoever it belongs to.
    pub fn clear(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn lookup(&self, user: &UserId) -> Option<SessionToken> {
        let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        match cached.as_ref() {
            Some((owner, token)) if owner == user => Some(token.clone()),
            _ => None,
        }
    }
}

impl<S: TokenSupplier> TokenSupplier for CachedTokenSupplier<S> {
    async fn fetch_token(
        &self,
        identity: &Identity,
    ) -> Result<SessionToken, TokenFetchError> {
        if let Some(token) = self.lookup(&identity.id) {
            tracing::trace!(user_id = %identity.id, "using cached session token");
            return Ok(token);
        }

        let token = self.inner.fetch_token(identity).await?;
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((identity.id.clone(), token.clone()));
        Ok(token)
    }

    fn invalidate(&self, user: &UserId) {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if cached.as_ref().is_some_and(|(owner, _)| owner == user) {
            *cached = None;
        }
        self.inner.invalidate(user);
    }
}
