//! Logger bring-up

use crate::config::LoggingConfig;

/// Install `env_logger` with `level` as the default filter. `RUST_LOG`
/// overrides it. Returns false when a logger was already installed.
pub fn init(level: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init()
        .is_ok()
}

pub fn init_from_config(config: &LoggingConfig) -> bool {
    init(&config.level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("debug");
        assert!(!init("info"));
    }
}
