// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tracing setup for the binary.

use tracing_subscriber::EnvFilter;

/// Filter used without `--log-level`: warnings everywhere, plus this crate's
/// lifecycle and access-log lines (`--quiet` turns the latter off).
pub const DEFAULT_FILTER: &str = "warn,lively_cli=info";

/// Builds the filter for `--log-level`, falling back to [`DEFAULT_FILTER`]
/// when none is given or the directive does not parse.
pub fn filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("Invalid log level '{}': {}", level, e);
            EnvFilter::new(DEFAULT_FILTER)
        }),
        None => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Installs the global subscriber.
pub fn init(level: Option<&str>) {
    tracing_subscriber::fmt().with_env_filter(filter(level)).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn emitted(level: Option<&str>) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter(level))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "lively_cli::server::http", path = "/", "request");
            tracing::info!(target: "notify", "noise");
        });

        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_access_log_visible_by_default() {
        let logs = emitted(None);
        assert!(logs.contains("request"));
        assert!(!logs.contains("noise"));
    }

    #[test]
    fn test_explicit_level_wins() {
        assert!(!emitted(Some("warn")).contains("request"));
        assert!(emitted(Some("debug")).contains("noise"));
    }

    #[test]
    fn test_bad_directive_falls_back_to_default() {
        assert!(emitted(Some("lively_cli=loud")).contains("request"));
    }
}
