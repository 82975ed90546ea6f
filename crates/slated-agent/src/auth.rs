//! Authentication for the remote agent service
//!
//! Requests carry a bearer token obtained from an injectable credential
//! provider targeting a fixed audience. Tokens are cached in-memory and
//! reused while their expiry is more than one minute away.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use slated_core::{Result, SlatedError};
use tokio::sync::Mutex;

/// Audience all tokens are requested for
pub const TOKEN_AUDIENCE: &str = "https://ai.azure.com/.default";

/// Minimum remaining validity before a cached token is refreshed
const EXPIRY_SLACK_SECS: i64 = 60;

/// A bearer token with its expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Credential provider seam.
///
/// Production reads a static token from the environment; deployments with a
/// real credential flow (managed identity, CLI login) implement this trait.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self, audience: &str) -> Result<AccessToken>;
}

/// Reads a static bearer token from `FOUNDRY_ACCESS_TOKEN`
pub struct EnvTokenProvider;

/// Static tokens carry no expiry metadata; assume one hour
const ENV_TOKEN_TTL_SECS: i64 = 3600;

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn fetch_token(&self, _audience: &str) -> Result<AccessToken> {
        let token = std::env::var("FOUNDRY_ACCESS_TOKEN").map_err(|_| {
            SlatedError::Config(
                "No credentials found. Set FOUNDRY_ACCESS_TOKEN to a bearer token \
                 for the agent service."
                    .to_string(),
            )
        })?;
        Ok(AccessToken {
            token,
            expires_at: Utc::now() + ChronoDuration::seconds(ENV_TOKEN_TTL_SECS),
        })
    }
}

/// Caches tokens from any [`TokenProvider`]
pub struct TokenCache {
    provider: Box<dyn TokenProvider>,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new(provider: Box<dyn TokenProvider>) -> Self {
        Self {
            provider,
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, refreshed when within a minute of expiry
    pub async fn bearer(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            let remaining = token.expires_at - Utc::now();
            if remaining > ChronoDuration::seconds(EXPIRY_SLACK_SECS) {
                return Ok(token.token.clone());
            }
        }

        tracing::debug!("Fetching fresh token for {}", TOKEN_AUDIENCE);
        let fresh = self.provider.fetch_token(TOKEN_AUDIENCE).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        ttl_secs: i64,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch_token(&self, audience: &str) -> Result<AccessToken> {
            assert_eq!(audience, TOKEN_AUDIENCE);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                token: format!("token-{}", n),
                expires_at: Utc::now() + ChronoDuration::seconds(self.ttl_secs),
            })
        }
    }

    #[tokio::test]
    async fn test_token_reused_while_valid() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = TokenCache::new(Box::new(CountingProvider {
            calls: calls.clone(),
            ttl_secs: 3600,
        }));

        assert_eq!(cache.bearer().await.unwrap(), "token-0");
        assert_eq!(cache.bearer().await.unwrap(), "token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_refreshed_near_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        // 30 seconds is inside the one-minute slack, so every call refreshes
        let cache = TokenCache::new(Box::new(CountingProvider {
            calls: calls.clone(),
            ttl_secs: 30,
        }));

        assert_eq!(cache.bearer().await.unwrap(), "token-0");
        assert_eq!(cache.bearer().await.unwrap(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
