//! Progress reporting for long-running stages.

use ochub_fetch::FetchProgress;
use ochub_shared::{BatchResult, VersionKey};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a version is fetched or built.
    fn version_started(&self, key: &VersionKey);
    /// Called when a version finished, successfully or not.
    fn version_finished(&self, key: &VersionKey, ok: bool);
    /// Called once the batch is complete.
    fn done(&self, result: &BatchResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn version_started(&self, _key: &VersionKey) {}
    fn version_finished(&self, _key: &VersionKey, _ok: bool) {}
    fn done(&self, _result: &BatchResult) {}
}

/// Forwards fetch-stage callbacks to a pipeline [`ProgressReporter`].
pub struct FetchReporter<'a>(pub &'a dyn ProgressReporter);

impl FetchProgress for FetchReporter<'_> {
    fn version_started(&self, key: &VersionKey) {
        self.0.version_started(key);
    }

    fn version_finished(&self, key: &VersionKey, ok: bool) {
        self.0.version_finished(key, ok);
    }
}
