//! Stream-classification and session-management core for the LoRa
//! range-test logger.
//!
//! The modules follow the receiver's data flow: raw lines are classified
//! into typed events, DATA readings are normalized and fed through the
//! session tracker, and the resulting rows are appended to one CSV file
//! per session. Device access and row persistence sit behind narrow
//! traits so the decision logic stays testable without hardware.

pub mod classifier;
pub mod driver;
pub mod normalize;
pub mod prelude;
pub mod record;
pub mod session;
pub mod sink;
pub mod stats;

pub use prelude::{DevicePort, RecordSink, StreamError, StreamResult};
