//! The watch core: tailing, offset persistence, rotation detection, and
//! error block capture.

mod detector;
mod error;
mod offset;
mod supervisor;
mod tailer;

pub use detector::{DetectorState, DispatchPolicy, ErrorBlock, ErrorBlockDetector, StartPatterns};
pub use error::WatchError;
pub use offset::OffsetStore;
pub use supervisor::{WatchSettings, WatchSupervisor};
pub use tailer::{LogTailer, SizeTracker};
