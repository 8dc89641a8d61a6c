//! Tracing setup for binaries embedding stagecraft.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::constants::ENV_LOG;

/// Filter used when `STAGECRAFT_LOG` is unset or invalid.
pub fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("stagecraft=debug")
    } else {
        EnvFilter::new("stagecraft=warn")
    }
}

/// Install a global subscriber writing compact lines to stderr.
///
/// `STAGECRAFT_LOG` takes precedence over `verbose`. Returns `false` if a
/// global subscriber was already installed.
pub fn init(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| default_filter(verbose));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}

/// Like [`init`], but emits one JSON object per event.
pub fn init_json(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| default_filter(verbose));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(false).to_string(), "stagecraft=warn");
        assert_eq!(default_filter(true).to_string(), "stagecraft=debug");
    }

    #[test]
    fn test_second_init_is_harmless() {
        let _ = init(false);
        assert!(!init(true));
    }
}
