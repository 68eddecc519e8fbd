//! Audible alert played when a new or changed order lands on the board.

use std::io::Write;

use tracing::debug;

/// Fire-and-forget alert sound. Implementations must never fail loudly.
pub trait Notifier: Send + Sync {
    fn play_alert_sound(&self);
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl Notifier for TerminalBell {
    fn play_alert_sound(&self) {
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|()| stderr.flush()) {
            debug!("Alert sound failed: {e}");
        }
    }
}

/// Discards alerts.
#[derive(Debug, Default)]
pub struct Silent;

impl Notifier for Silent {
    fn play_alert_sound(&self) {}
}
