//! Audio signals and spectrum analysis.
//!
//! Two live streams (microphone input and spoken/synthesized output) are
//! exposed as [`SignalHandle`]s; an [`Analyser`] turns either one into a
//! fixed-length byte spectrum once per frame.

mod analyser;
mod capture;
mod signal;
pub mod spectrum;
mod synthesis;
mod system;

// Re-export public types
pub use analyser::{Analyser, FrequencySnapshot};
pub use signal::SignalHandle;
pub use synthesis::{Voice, GLICOL_VOICE};
pub use system::{AudioSignals, AudioSystem};
