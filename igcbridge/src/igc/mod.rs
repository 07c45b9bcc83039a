//! IGC flight log output.
//!
//! - [`format`] - pure record encoders (`A`, `H`, `I`, `B`, `L` records)
//! - [`IgcWriter`] - session-based file writer

pub mod format;
mod writer;

pub use writer::{
    default_output_dir, format_duration, IgcWriter, RecordingMetadata, RecordingStatus,
    RecordingSummary, WriterConfig, WriterError, DEFAULT_FILE_PREFIX,
    DEFAULT_POSITION_EVENT_INTERVAL,
};
