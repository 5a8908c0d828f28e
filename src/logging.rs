use tracing_subscriber::EnvFilter;

/// Variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "CIVIC_LOG";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "civic=debug"
    } else {
        "civic=warn"
    }
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. Logs go to stderr so stdout only ever
/// carries command output.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "civic=warn");
        assert_eq!(default_directive(true), "civic=debug");
    }
}
