//! Batch orchestration for ccjoin.
//!
//! This crate ties together sampling, downloading, extraction and the join
//! into end-to-end runs over a data root (see [`pipeline::run`]).

pub mod layout;
pub mod manifest;
pub mod persist;
pub mod pipeline;
pub mod sampling;

pub use ccjoin_extract::ExtractStats;
pub use ccjoin_join::JoinStats;
pub use layout::Layout;
pub use manifest::{DownloadReport, DownloadStatus, FileReport, FileStatus, PairReport, RunManifest};
pub use persist::OutputMeta;
pub use pipeline::{ProgressReporter, RunResult, SilentProgress};
