//! Progress callbacks for catalog fetches and archive downloads.

/// Receives progress from the resolution pipeline. The host typically maps
/// it onto a background-task indicator.
pub trait ProgressReporter: Send + Sync {
    /// A new stage began, e.g. "Downloading Vineflower 1.10.1".
    fn start_step(&self, name: &str);

    /// Bytes written so far; `total` comes from `Content-Length` when sent.
    fn update_bytes(&self, transferred: u64, total: Option<u64>);

    fn set_message(&self, message: &str);

    /// The stage ended.
    fn done(&self, success: bool, message: Option<&str>);
}

/// Discards every update.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_step(&self, _name: &str) {}
    fn update_bytes(&self, _transferred: u64, _total: Option<u64>) {}
    fn set_message(&self, _message: &str) {}
    fn done(&self, _success: bool, _message: Option<&str>) {}
}

/// Writes updates to the `log` facade.
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn start_step(&self, name: &str) {
        log::debug!("[progress] {}", name);
    }

    fn update_bytes(&self, transferred: u64, total: Option<u64>) {
        match total {
            Some(total) => log::trace!("[progress] {}/{} bytes", transferred, total),
            None => log::trace!("[progress] {} bytes", transferred),
        }
    }

    fn set_message(&self, message: &str) {
        log::debug!("[progress] {}", message);
    }

    fn done(&self, success: bool, message: Option<&str>) {
        let outcome = if success { "finished" } else { "failed" };
        match message {
            Some(message) => log::debug!("[progress] {}: {}", outcome, message),
            None => log::debug!("[progress] {}", outcome),
        }
    }
}
