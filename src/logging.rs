use env_logger::Builder;
use log::LevelFilter;

/// Installs the global logger. `RUST_LOG` overrides `level`.
///
/// Returns `false` when a logger was already installed, which is harmless.
pub fn init_logging(level: LevelFilter) -> bool {
    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init_logging(LevelFilter::Debug);
        assert!(!init_logging(LevelFilter::Info));
    }
}
