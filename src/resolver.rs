//! Maps a presented bearer token to the identity it was issued for.
//!
//! The resolver knows nothing about the engine behind it. It asks the
//! configured [`IdentityStore`] once, retries a transient fault at most once,
//! and collapses every failure into one of two rejection reasons so callers
//! never see backend detail. One deadline covers the whole resolution,
//! retries included.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::db::{DatabaseError, IdentityStore};
use crate::metrics::Metrics;
use crate::utils::logging::token_hint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TokenNotFound,
    BackendUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Resolved { userid: String },
    Rejected { reason: RejectReason },
}

impl Resolution {
    pub fn resolved<U: Into<String>>(userid: U) -> Self {
        Resolution::Resolved {
            userid: userid.into(),
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Resolution::Rejected { reason }
    }

    pub fn userid(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { userid } => Some(userid),
            Resolution::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub transient_retries: u32,
    pub delay: Duration,
    /// Upper bound on one resolution, every attempt and delay included.
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transient_retries: 1,
            delay: Duration::from_millis(50),
            budget: Duration::from_millis(2000),
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            transient_retries: config.resolver.transient_retries.min(1),
            delay: config.resolver.retry_delay(),
            budget: config.database.lookup_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    retry: RetryPolicy,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn resolve(&self, token: &str) -> Resolution {
        let deadline = Instant::now() + self.retry.budget;
        let mut retries_left = self.retry.transient_retries;

        loop {
            let attempt = tokio::time::timeout_at(deadline, self.store.lookup(token))
                .await
                .unwrap_or_else(|_| Err(DatabaseError::Timeout(self.retry.budget)));

            match attempt {
                Ok(Some(userid)) => {
                    Metrics::resolved();
                    return Resolution::Resolved { userid };
                }
                Ok(None) => {
                    debug!(token = %token_hint(token), "token not found");
                    Metrics::token_not_found();
                    return Resolution::rejected(RejectReason::TokenNotFound);
                }
                Err(err) if err.is_transient() && retries_left > 0 && self.fits(deadline) => {
                    retries_left -= 1;
                    warn!(
                        backend = self.store.backend_name(),
                        error = %err,
                        delay_ms = self.retry.delay.as_millis() as u64,
                        "transient identity lookup failure, retrying"
                    );
                    Metrics::transient_retry();
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => return self.unavailable(token, err),
            }
        }
    }

    /// Whether a retry can still start before `deadline`.
    fn fits(&self, deadline: Instant) -> bool {
        deadline.saturating_duration_since(Instant::now()) > self.retry.delay
    }

    fn unavailable(&self, token: &str, err: DatabaseError) -> Resolution {
        let backend = self.store.backend_name();
        match &err {
            DatabaseError::SchemaViolation(_) => {
                Metrics::schema_violation();
                error!(
                    backend,
                    token = %token_hint(token),
                    error = %err,
                    "identity table violates its primary key, refusing to resolve"
                );
            }
            _ if err.is_transient() => {
                warn!(backend, error = %err, "identity backend unavailable");
            }
            _ => {
                error!(backend, error = %err, "identity lookup failed");
            }
        }
        Metrics::backend_unavailable();
        Resolution::rejected(RejectReason::BackendUnavailable)
    }
}
