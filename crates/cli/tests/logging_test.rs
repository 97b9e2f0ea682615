//! # Logging Tests
//!
//! The log filter must honour `RUST_LOG` and only fall back to `seogen=info`.

use seogen_cli::{log_filter, DEFAULT_LOG_DIRECTIVE};
use std::env;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt;

// Environment variables are process-wide, so tests touching them run one at a time.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// A writer that keeps everything logged through it.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Logs one debug and one info event from a library target under the current
/// `RUST_LOG`, returning what the subscriber wrote.
fn log_under_current_env() -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(log_filter())
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!(target: "seogen::pipeline", "--> Sending prompt to AI provider");
        tracing::info!(target: "seogen::batch", "Starting batch");
    });
    captured.text()
}

#[test]
fn test_rust_log_is_not_overridden_by_the_default_directive() {
    let _guard = ENV_LOCK.lock().unwrap();
    // --- 1. Arrange ---
    env::set_var("RUST_LOG", "seogen=debug");

    // --- 2. Act ---
    let output = log_under_current_env();
    env::remove_var("RUST_LOG");

    // --- 3. Assert ---
    assert!(output.contains("Sending prompt"), "debug event was filtered out: {output:?}");
    assert!(output.contains("Starting batch"));
}

#[test]
fn test_default_directive_applies_without_rust_log() {
    let _guard = ENV_LOCK.lock().unwrap();
    env::remove_var("RUST_LOG");

    let output = log_under_current_env();

    assert_eq!(DEFAULT_LOG_DIRECTIVE, "seogen=info");
    assert!(!output.contains("Sending prompt"), "unexpected debug output: {output:?}");
    assert!(output.contains("Starting batch"));
}
