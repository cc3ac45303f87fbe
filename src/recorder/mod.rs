//! Recording system module
//!
//! - RecordingSession drives a stream's recorder into a buffer
//! - RecordingBuffer is the finalized, immutable result

pub mod session;
pub mod state;

pub use session::RecordingSession;
pub use state::{RecordingBuffer, RecordingState, RECORDING_MIME};
