//! Access credential lifecycle.
//!
//! A single [`TokenManager`] is shared by every in-flight job. The current
//! credential sits behind an async mutex: a caller that finds it stale
//! issues a new one while holding the lock, and callers queued behind it
//! reuse that result instead of issuing their own. A failed refresh is
//! handed to the callers that were waiting on it as the same `Critical`.

use super::api::{ClipHostApi, TokenGrant};
use crate::config::{TOKEN_EXPIRY_MARGIN_SECS, TOKEN_ISSUE_MAX_ATTEMPTS};
use crate::error::{ClipError, ClipResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Client id/secret pair used for credential issuance.
#[derive(Clone)]
pub struct ClientCredentials {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[MASKED]")
            .finish()
    }
}

/// Bearer token together with the instant it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    expires_at: Instant,
}

impl Credential {
    fn from_grant(grant: TokenGrant, issued_at: Instant) -> Self {
        let lifetime = grant.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        Self {
            access_token: grant.access_token,
            expires_at: issued_at + Duration::from_secs(lifetime),
        }
    }

    /// Token to send as `Authorization: Bearer <token>`.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Valid iff `now` is strictly before the expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct TokenState {
    credential: Option<Credential>,
    last_failure: Option<ClipError>,
}

/// Owner of the shared clip-hosting credential
pub struct TokenManager {
    api: Arc<dyn ClipHostApi>,
    credentials: ClientCredentials,
    state: Mutex<TokenState>,
    // Bumped under the lock each time a refresh finishes.
    refreshes: AtomicU64,
}

impl TokenManager {
    /// Create a manager with no credential; the first `ensure` issues one.
    #[must_use]
    pub fn new(api: Arc<dyn ClipHostApi>, credentials: ClientCredentials) -> Self {
        Self {
            api,
            credentials,
            state: Mutex::new(TokenState::default()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Return a valid credential, issuing a new one if missing or expired.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::Critical`] if issuance fails
    /// [`TOKEN_ISSUE_MAX_ATTEMPTS`] times in a row, or if a refresh this
    /// call waited on failed that way.
    pub async fn ensure(&self) -> ClipResult<Credential> {
        let seen = self.refreshes.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if let Some(credential) = state.credential.as_ref() {
            if credential.is_valid_at(Instant::now()) {
                return Ok(credential.clone());
            }
        }

        // A refresh finished while this caller was queued: share its outcome.
        if self.refreshes.load(Ordering::Acquire) != seen {
            if let Some(failure) = state.last_failure.clone() {
                debug!("Reusing failed clip host token refresh");
                return Err(failure);
            }
        }

        if state.credential.is_some() {
            debug!("Clip host credential expired, refreshing");
        }

        let outcome = self.issue().await;
        match &outcome {
            Ok(fresh) => {
                state.credential = Some(fresh.clone());
                state.last_failure = None;
            }
            Err(e) => state.last_failure = Some(e.clone()),
        }
        self.refreshes.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn issue(&self) -> ClipResult<Credential> {
        let mut last_error = None;

        for attempt in 1..=TOKEN_ISSUE_MAX_ATTEMPTS {
            let issued_at = Instant::now();
            match self
                .api
                .issue_token(&self.credentials.client_id, &self.credentials.client_secret)
                .await
            {
                Ok(grant) => {
                    info!(
                        attempt,
                        expires_in = grant.expires_in,
                        "Issued clip host access token"
                    );
                    return Ok(Credential::from_grant(grant, issued_at));
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Clip host token issuance failed");
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        Err(ClipError::critical(format!(
            "could not retrieve auth token after {TOKEN_ISSUE_MAX_ATTEMPTS} attempts: {detail}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::api::{ApiError, MockClipHostApi};

    fn credentials() -> ClientCredentials {
        ClientCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    fn grant(token: &str, expires_in: u64) -> TokenGrant {
        TokenGrant {
            access_token: token.to_string(),
            expires_in,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reuses_until_expiry_then_reissues() {
        let mut api = MockClipHostApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_issue_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(grant("first", 65)));
        api.expect_issue_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(grant("second", 65)));

        let manager = TokenManager::new(Arc::new(api), credentials());

        let first = manager.ensure().await.expect("issue");
        assert_eq!(first.access_token(), "first");

        // Lifetime is 65s minus the 5s margin.
        tokio::time::advance(Duration::from_secs(59)).await;
        let reused = manager.ensure().await.expect("reuse");
        assert_eq!(reused.access_token(), "first");

        tokio::time::advance(Duration::from_secs(1)).await;
        let renewed = manager.ensure().await.expect("reissue");
        assert_eq!(renewed.access_token(), "second");
    }

    #[tokio::test]
    async fn recovers_within_issue_budget() {
        let mut api = MockClipHostApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_issue_token()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ApiError::Network("reset".to_string())));
        api.expect_issue_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(grant("third-time", 3600)));

        let manager = TokenManager::new(Arc::new(api), credentials());
        let credential = manager.ensure().await.expect("third attempt succeeds");
        assert_eq!(credential.access_token(), "third-time");
    }

    #[tokio::test]
    async fn three_failures_are_critical() {
        let mut api = MockClipHostApi::new();
        api.expect_issue_token().times(3).returning(|_, _| {
            Err(ApiError::Status {
                status: 401,
                body: "invalid_client".to_string(),
            })
        });

        let manager = TokenManager::new(Arc::new(api), credentials());
        let err = manager.ensure().await.expect_err("must fail");
        let ClipError::Critical(message) = err else {
            panic!("expected critical error, got {err:?}");
        };
        assert!(message.contains("401"), "unexpected message: {message}");
        assert!(message.contains("invalid_client"), "unexpected message: {message}");
    }

    #[test]
    fn short_lifetimes_saturate() {
        let now = Instant::now();
        let credential = Credential::from_grant(grant("t", 3), now);
        assert!(!credential.is_valid_at(now));
    }

    #[test]
    fn debug_masks_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("[MASKED]"));
    }
}
