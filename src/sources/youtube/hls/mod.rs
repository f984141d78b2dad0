//! HLS (M3U8) Segment Planner path (§4.9). Kept and adapted from the
//! teacher's `sources/youtube/hls` module: the parser/utils are unchanged in
//! approach, the resolver is rewritten against the async `Transport` instead
//! of a blocking client (this pipeline has no symphonia decode step to
//! justify a blocking thread), and DRM detection (`#EXT-X-KEY` with
//! `METHOD` other than `NONE`) is added.

pub mod fetcher;
pub mod parser;
pub mod resolver;
pub mod types;
pub mod utils;

pub use fetcher::*;
pub use parser::*;
pub use resolver::*;
pub use types::*;
