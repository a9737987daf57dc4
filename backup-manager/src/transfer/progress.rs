//! Byte-level progress tracking for downloads.

use std::time::Instant;

/// Progress of a single transfer with time-based speed calculation
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Expected size, when the server announced one
    pub total_bytes: Option<u64>,

    pub transferred_bytes: u64,

    /// Average speed since the transfer started
    pub bytes_per_second: u64,

    start_time: Instant,
}

impl TransferProgress {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            total_bytes,
            transferred_bytes: 0,
            bytes_per_second: 0,
            start_time: Instant::now(),
        }
    }

    /// Record the running byte count and refresh the speed.
    pub fn update(&mut self, transferred_bytes: u64) {
        self.transferred_bytes = transferred_bytes;

        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.bytes_per_second = (transferred_bytes as f64 / elapsed) as u64;
        }
    }

    /// Percentage complete, if the total is known
    pub fn percent(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(100.0),
            Some(total) => Some((self.transferred_bytes as f64 / total as f64 * 100.0).min(100.0)),
            None => None,
        }
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed as human-readable string
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}
