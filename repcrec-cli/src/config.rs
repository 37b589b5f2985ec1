//! Driver configuration (§12): trace source selection, log verbosity, and
//! color, following the host family's `ConfigLoad`-with-`Default` pattern.
//! Site and record counts are not configurable — they're load-bearing
//! simulator constants fixed by `repcrec::coordinator`.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config { log_level: "warn".to_string(), log_dir: default_log_dir(), color: true }
    }
}

/// `~/.repcrec`, falling back to `./.repcrec` if `HOME` is unset — mirrors
/// how the host family resolves its own log directory.
fn default_log_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".repcrec"),
        Err(_) => PathBuf::from(".repcrec"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_warn_and_colored() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "warn");
        assert!(cfg.color);
    }
}
