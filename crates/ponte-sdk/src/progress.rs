//! Build-progress records
//!
//! The native build tooling is an external collaborator. It runs on a worker
//! thread and reports progress as `{progress, message}` records; whatever
//! displays them lives on the owning thread and implements [`ProgressSink`].

/// One progress update from the build tooling
#[derive(Debug, Clone, PartialEq)]
pub struct BuildProgress {
    /// Completion in `0.0..=1.0`
    pub progress: f32,
    /// Human-readable step description
    pub message: String,
}

impl BuildProgress {
    /// Create a record, clamping `progress` into `0.0..=1.0`
    pub fn new(progress: f32, message: impl Into<String>) -> Self {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        Self {
            progress,
            message: message.into(),
        }
    }

    /// Final record emitted when the external process exits
    pub fn completed() -> Self {
        Self::new(1.0, "Completed process")
    }

    /// Check whether this record marks completion
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Consumer of progress records on the owning thread
pub trait ProgressSink {
    /// Display or record an update
    fn update(&mut self, progress: &BuildProgress);
}

impl<F: FnMut(&BuildProgress)> ProgressSink for F {
    fn update(&mut self, progress: &BuildProgress) {
        self(progress)
    }
}
