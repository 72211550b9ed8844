use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

static RESOLUTIONS_RESOLVED: AtomicU64 = AtomicU64::new(0);
static RESOLUTIONS_NOT_FOUND: AtomicU64 = AtomicU64::new(0);
static RESOLUTIONS_UNAVAILABLE: AtomicU64 = AtomicU64::new(0);
static TRANSIENT_RETRIES: AtomicU64 = AtomicU64::new(0);
static SCHEMA_VIOLATIONS: AtomicU64 = AtomicU64::new(0);

pub struct Metrics;

impl Metrics {
    /// Pins the uptime origin; call once at startup.
    pub fn start() {
        Lazy::force(&STARTED_AT);
    }

    pub fn resolved() {
        RESOLUTIONS_RESOLVED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_not_found() {
        RESOLUTIONS_NOT_FOUND.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backend_unavailable() {
        RESOLUTIONS_UNAVAILABLE.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transient_retry() {
        TRANSIENT_RETRIES.fetch_add(1, Ordering::Relaxed);
    }

    pub fn schema_violation() {
        SCHEMA_VIOLATIONS.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn format_prometheus() -> String {
    let uptime = STARTED_AT.elapsed().as_secs();
    let resolved = RESOLUTIONS_RESOLVED.load(Ordering::Relaxed);
    let not_found = RESOLUTIONS_NOT_FOUND.load(Ordering::Relaxed);
    let unavailable = RESOLUTIONS_UNAVAILABLE.load(Ordering::Relaxed);
    let retries = TRANSIENT_RETRIES.load(Ordering::Relaxed);
    let violations = SCHEMA_VIOLATIONS.load(Ordering::Relaxed);

    format!(
        r#"# HELP identity_resolver_uptime_seconds Number of seconds the resolver has been running
# TYPE identity_resolver_uptime_seconds gauge
identity_resolver_uptime_seconds {}

# HELP identity_resolutions_total Token resolutions by outcome
# TYPE identity_resolutions_total counter
identity_resolutions_total{{outcome="resolved"}} {}
identity_resolutions_total{{outcome="token_not_found"}} {}
identity_resolutions_total{{outcome="backend_unavailable"}} {}

# HELP identity_transient_retries_total Lookups retried after a transient backend fault
# TYPE identity_transient_retries_total counter
identity_transient_retries_total {}

# HELP identity_schema_violations_total Lookups that found more than one row for a token
# TYPE identity_schema_violations_total counter
identity_schema_violations_total {}
"#,
        uptime, resolved, not_found, unavailable, retries, violations,
    )
}
