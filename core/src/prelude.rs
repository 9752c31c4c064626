use crate::record::LogRecord;
use crate::session::SessionKey;

/// Common error type for stream processing.
///
/// Only `DeviceUnavailable` is fatal, and only at startup; every other
/// variant is absorbed by the driver loop after being reported.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("malformed line: {0}")]
    MalformedLine(String),
    #[error("numeric parse failure: {0}")]
    NumericParse(String),
    #[error("no active session for lost packet {0}")]
    NoActiveSession(String),
    #[error("sink write failure: {0}")]
    SinkWrite(String),
    #[error("device read failure: {0}")]
    DeviceRead(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Narrow interface over the serial device the driver reads from.
///
/// `read_line` returns `Ok(None)` when the read timed out with nothing
/// buffered; a partial line at timeout is returned as-is.
pub trait DevicePort {
    fn bytes_available(&mut self) -> StreamResult<usize>;
    fn read_line(&mut self) -> StreamResult<Option<Vec<u8>>>;
    fn discard_buffered(&mut self) -> StreamResult<()>;
}

/// Append-only destination for session records.
///
/// Implementations must emit the header exactly once per session identity
/// and tolerate repeated appends against the same identity.
pub trait RecordSink {
    fn append(&mut self, session: &SessionKey, record: &LogRecord) -> StreamResult<()>;
}
