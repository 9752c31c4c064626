use crate::prelude::{RecordSink, StreamError, StreamResult};
use crate::record::{LogRecord, CSV_HEADERS};
use crate::session::SessionKey;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Durable sink writing one CSV file per session identity under a log
/// directory. The header is written when the file is created and never
/// again; appends against an existing identity only add rows.
pub struct CsvSink {
    log_dir: PathBuf,
}

impl CsvSink {
    pub fn new(log_dir: impl Into<PathBuf>) -> StreamResult<Self> {
        let log_dir = log_dir.into();
        std::fs::create_dir_all(&log_dir).map_err(|e| {
            StreamError::SinkWrite(format!("creating log dir {}: {}", log_dir.display(), e))
        })?;
        Ok(Self { log_dir })
    }

    pub fn path_for(&self, session: &SessionKey) -> PathBuf {
        self.log_dir.join(session.file_name())
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, session: &SessionKey, record: &LogRecord) -> StreamResult<()> {
        let path = self.path_for(session);
        let needs_header = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StreamError::SinkWrite(format!("opening {}: {}", path.display(), e)))?;
        if needs_header {
            writeln!(file, "{}", CSV_HEADERS.join(","))
                .map_err(|e| StreamError::SinkWrite(format!("writing {}: {}", path.display(), e)))?;
        }
        writeln!(file, "{}", record.to_row())
            .map_err(|e| StreamError::SinkWrite(format!("writing {}: {}", path.display(), e)))?;
        Ok(())
    }
}

/// In-memory sink used by driver tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub rows: Vec<(SessionKey, LogRecord)>,
}

#[cfg(test)]
impl RecordSink for MemorySink {
    fn append(&mut self, session: &SessionKey, record: &LogRecord) -> StreamResult<()> {
        self.rows.push((session.clone(), record.clone()));
        Ok(())
    }
}
