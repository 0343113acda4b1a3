//! The interface the phase controller drives.
//!
//! [`Sampler`] is the real implementation. [`NullRecorder`] only logs, for
//! running a protocol with no sensor or output.

use crate::error::Result;
use crate::sampler::Sampler;
use crate::summary::SessionSummary;

/// Something that can be started, annotated with a load level, marked at
/// phase boundaries and stopped.
pub trait Recorder {
    fn start(&mut self) -> Result<()>;

    /// Load annotation for subsequent samples.
    fn set_load(&self, percent: u32);

    /// Append a marker now.
    fn mark(&self, text: &str) -> Result<()>;

    /// Stop and close. `Ok(None)` means there was nothing to close.
    fn stop(&mut self) -> Result<Option<SessionSummary>>;
}

impl Recorder for Sampler {
    fn start(&mut self) -> Result<()> {
        Sampler::start(self)
    }

    fn set_load(&self, percent: u32) {
        Sampler::set_load(self, percent);
    }

    fn mark(&self, text: &str) -> Result<()> {
        Sampler::mark(self, text)
    }

    fn stop(&mut self) -> Result<Option<SessionSummary>> {
        Sampler::stop(self)
    }
}

/// Recorder that writes nothing.
#[derive(Debug, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_load(&self, percent: u32) {
        log::debug!("load {percent}%");
    }

    fn mark(&self, text: &str) -> Result<()> {
        log::info!("marker {text}");
        Ok(())
    }

    fn stop(&mut self) -> Result<Option<SessionSummary>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_recorder_accepts_everything() {
        let mut recorder = NullRecorder;
        recorder.start().unwrap();
        recorder.set_load(50);
        recorder.mark("STRESS_50_BEGIN").unwrap();
        assert!(recorder.stop().unwrap().is_none());
    }
}
