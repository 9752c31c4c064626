use log::info;

/// Per-stream counters owned by the driver loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub lines: usize,
    pub records_written: usize,
    pub malformed: usize,
    pub dropped_readings: usize,
    pub lost_without_session: usize,
    pub write_failures: usize,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_summary(&self) {
        info!(
            "stream summary: {} lines, {} records written, {} malformed, {} dropped, {} lost without session, {} write failures",
            self.lines,
            self.records_written,
            self.malformed,
            self.dropped_readings,
            self.lost_without_session,
            self.write_failures
        );
    }
}
