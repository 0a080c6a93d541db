//! `LIBTRACEIO` environment tokenizer (spec section 6). Process-wide
//! configuration, parsed once on first use and memoized (spec section 2,
//! "process-wide state initialized once on first use").

use std::env;
use std::sync::OnceLock;

/// `{keep_stats, autodetect, use_threads, max_buffers}` (spec section 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub keep_stats: bool,
    pub autodetect: bool,
    /// `0` disables the prefetch/writeback thread wrapper.
    pub use_threads: u32,
    pub max_buffers: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            keep_stats: false,
            autodetect: true,
            use_threads: 1,
            max_buffers: 4,
        }
    }
}

impl Config {
    /// Parses a raw `LIBTRACEIO` value. Unrecognized tokens are logged as a
    /// warning and otherwise ignored; empty tokens (from `,,` or leading/
    /// trailing commas) are silently skipped.
    pub fn parse(raw: &str) -> Config {
        let mut cfg = Config::default();
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token {
                "stats" => cfg.keep_stats = true,
                "noautodetect" => cfg.autodetect = false,
                "nothreads" => cfg.use_threads = 0,
                _ if token.starts_with("threads=") => match token["threads=".len()..].parse() {
                    Ok(n) => cfg.use_threads = n,
                    Err(_) => log::warn!("wandio: ignoring malformed config token {token:?}"),
                },
                _ if token.starts_with("buffers=") => match token["buffers=".len()..].parse() {
                    Ok(n) => cfg.max_buffers = n,
                    Err(_) => log::warn!("wandio: ignoring malformed config token {token:?}"),
                },
                other => log::warn!("wandio: unrecognized config token {other:?}"),
            }
        }
        cfg
    }

    /// Reads and memoizes `LIBTRACEIO` from the process environment. Later
    /// calls return the same parsed value even if the environment variable
    /// changes underneath the process.
    pub fn from_env() -> &'static Config {
        static CONFIG: OnceLock<Config> = OnceLock::new();
        CONFIG.get_or_init(|| match env::var("LIBTRACEIO") {
            Ok(raw) => Config::parse(&raw),
            Err(_) => Config::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert!(!cfg.keep_stats);
        assert!(cfg.autodetect);
        assert_eq!(cfg.use_threads, 1);
    }

    #[test]
    fn parses_all_recognized_tokens() {
        let cfg = Config::parse("stats,noautodetect,threads=0,buffers=16");
        assert!(cfg.keep_stats);
        assert!(!cfg.autodetect);
        assert_eq!(cfg.use_threads, 0);
        assert_eq!(cfg.max_buffers, 16);
    }

    #[test]
    fn ignores_empty_tokens() {
        let cfg = Config::parse(",stats,,noautodetect,");
        assert!(cfg.keep_stats);
        assert!(!cfg.autodetect);
    }

    #[test]
    fn unrecognized_token_does_not_panic() {
        let cfg = Config::parse("bogus,stats");
        assert!(cfg.keep_stats);
    }
}
