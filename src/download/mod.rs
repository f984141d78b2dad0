pub mod progressive;
pub mod resume;
pub mod segment;

pub use progressive::{download_progressive, extract_audio_if_requested, ProgressiveResult};
pub use segment::{download_segments, SegmentPlan};
