// src/logging.rs

//! Tracing subscriber setup for embedders and tests

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a global fmt subscriber
///
/// `RUST_LOG` wins when set; otherwise the level follows `verbosity`
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace). Only the first call has
/// any effect.
pub fn init(verbosity: u8) {
    INIT.call_once(|| {
        let default_level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        // Another subscriber may already be installed by the embedding program
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(2);
        init(0);
        tracing::debug!("logging initialized");
    }
}
