//! Observer trait for processing-step events.
//!
//! Pass a [`ProcessingObserver`] to
//! [`crate::session::ProcessingSession::run`] (or the conversion view) to
//! receive a snapshot of the six steps every time one changes. The terminal
//! front end renders these as a progress list; tests use them to check that
//! steps only ever complete left to right.
//!
//! # Example
//!
//! ```rust
//! use docintelli::{ProcessingObserver, ProcessingStep, StepStatus};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct CountDone(AtomicUsize);
//!
//! impl ProcessingObserver for CountDone {
//!     fn on_steps(&self, steps: &[ProcessingStep]) {
//!         let done = steps.iter().filter(|s| s.status == StepStatus::Done).count();
//!         self.0.store(done, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::DocIntelliError;
use crate::session::ProcessingStep;
use std::sync::Arc;

/// Called by the processing session as a conversion attempt advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProcessingObserver: Send + Sync {
    /// Called once when an attempt starts, after the steps were reset.
    fn on_start(&self, file_name: &str) {
        let _ = file_name;
    }

    /// Called with the full step list after every status change.
    fn on_steps(&self, steps: &[ProcessingStep]) {
        let _ = steps;
    }

    /// Called when the backend returned Markdown and every step is done.
    ///
    /// # Arguments
    /// * `markdown_len`: byte length of the produced Markdown
    fn on_complete(&self, markdown_len: usize) {
        let _ = markdown_len;
    }

    /// Called when the attempt failed; steps have been reset to pending.
    ///
    /// `error` carries full detail for logging, not for display.
    fn on_failure(&self, error: &DocIntelliError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need step events.
pub struct NoopObserver;

impl ProcessingObserver for NoopObserver {}

/// Convenience alias for a shared observer.
pub type SharedObserver = Arc<dyn ProcessingObserver>;
