// Environment helpers shared by the config layers

use tracing::warn;

/// Parse an environment variable, logging a warning if the value is present but invalid.
pub(crate) fn parse_env_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => match v.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = name, value = %v, "Invalid env var value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse an optional environment variable; unset or invalid values yield `None`.
pub(crate) fn optional_env_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let v = std::env::var(name).ok()?;
    match v.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(var = name, value = %v, "Invalid env var value, ignoring");
            None
        }
    }
}
