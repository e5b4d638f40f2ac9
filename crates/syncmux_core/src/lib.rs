//! syncmux core - batch MKV remux and synchronization engine.
//!
//! Given a reference source and one or more secondary sources, the engine
//! measures per-source timing offsets from decoded audio, diagnoses
//! pathological timing (PAL speed-up, linear drift, stepped delays),
//! applies lossless corrections, keeps subtitles and chapters consistent
//! with those corrections, and plans the final mux for the external muxer.
//!
//! No UI dependencies; the embedding application supplies a log/progress
//! sink and receives per-job results.

pub mod analysis;
pub mod chapters;
pub mod config;
pub mod correction;
pub mod extraction;
pub mod io;
pub mod logging;
pub mod models;
pub mod mux;
pub mod orchestrator;
pub mod subtitles;

pub use config::Settings;
pub use models::{JobResult, JobSpec, JobStatus};
pub use orchestrator::{run_batch, run_job};

/// Crate version, for the CLI banner.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
