use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(err) = installed {
        eprintln!("tracing subscriber already installed: {err}");
    }
}

/// Tokens shorter than this are logged by length only.
const HINT_MIN_TOKEN_CHARS: usize = 16;
const HINT_PREFIX_CHARS: usize = 4;

/// Loggable stand-in for a bearer token: its length and, for long tokens, the
/// first few characters. Never the whole credential.
pub fn token_hint(token: &str) -> String {
    let chars = token.chars().count();
    if chars < HINT_MIN_TOKEN_CHARS {
        return format!("…({chars} chars)");
    }
    let prefix: String = token.chars().take(HINT_PREFIX_CHARS).collect();
    format!("{prefix}…({chars} chars)")
}
