//! The processing session: six visual steps around one real request.
//!
//! ```text
//!  Idle ──begin──▶ Running ──ok──▶ Complete
//!   ▲                 │
//!   │                 └──err──▶ Failed
//!   └──────── reset (from any phase)
//! ```
//!
//! The service only returns a final result, so the step sequence is a
//! cosmetic approximation of its pipeline. Five steps are paced by fixed
//! timers from [`StepPacing`]; the AI-analysis step is held for exactly as
//! long as the conversion request takes.
//!
//! At every observable instant the statuses read
//! `Done* InProgress? Pending*` from left to right.

use crate::config::{FeatureFlags, StepPacing};
use crate::error::{DocIntelliError, UserMessage};
use crate::gateway::Backend;
use crate::input::PdfFile;
use crate::progress::ProcessingObserver;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Status of one processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    InProgress,
    Done,
}

/// The six fixed stages of the processing display, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Parse,
    Extract,
    DetectFormulas,
    AiAnalyze,
    FormulasToLatex,
    GenerateMarkdown,
}

impl StepKind {
    pub const ALL: [StepKind; 6] = [
        StepKind::Parse,
        StepKind::Extract,
        StepKind::DetectFormulas,
        StepKind::AiAnalyze,
        StepKind::FormulasToLatex,
        StepKind::GenerateMarkdown,
    ];

    /// Text shown next to the step.
    pub fn label(self) -> &'static str {
        match self {
            StepKind::Parse => "Parsing PDF structure",
            StepKind::Extract => "Extracting text and tables",
            StepKind::DetectFormulas => "Identifying mathematical formulas",
            StepKind::AiAnalyze => "Analyzing images with Gemini AI",
            StepKind::FormulasToLatex => "Converting formulas to LaTeX",
            StepKind::GenerateMarkdown => "Generating final Markdown",
        }
    }

    /// Stable identifier, e.g. for JSON progress output.
    pub fn slug(self) -> &'static str {
        match self {
            StepKind::Parse => "parse",
            StepKind::Extract => "extract",
            StepKind::DetectFormulas => "detect-formulas",
            StepKind::AiAnalyze => "ai-analyze",
            StepKind::FormulasToLatex => "formulas-to-latex",
            StepKind::GenerateMarkdown => "generate-markdown",
        }
    }

    /// The step synchronised with the conversion request.
    pub fn is_ai_step(self) -> bool {
        matches!(self, StepKind::AiAnalyze)
    }

    fn delay(self, pacing: &StepPacing) -> Option<Duration> {
        match self {
            StepKind::Parse => Some(pacing.parse),
            StepKind::Extract => Some(pacing.extract),
            StepKind::DetectFormulas => Some(pacing.detect_formulas),
            StepKind::AiAnalyze => None,
            StepKind::FormulasToLatex => Some(pacing.formulas_to_latex),
            StepKind::GenerateMarkdown => Some(pacing.generate_markdown),
        }
    }
}

/// One step and its current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStep {
    pub kind: StepKind,
    pub status: StepStatus,
}

impl ProcessingStep {
    pub fn name(&self) -> &'static str {
        self.kind.label()
    }

    pub fn is_ai_step(&self) -> bool {
        self.kind.is_ai_step()
    }
}

/// The ordered list of six steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepList {
    steps: [ProcessingStep; 6],
}

impl Default for StepList {
    fn default() -> Self {
        Self::new()
    }
}

impl StepList {
    /// All six steps, pending.
    pub fn new() -> Self {
        Self {
            steps: StepKind::ALL.map(|kind| ProcessingStep {
                kind,
                status: StepStatus::Pending,
            }),
        }
    }

    pub fn steps(&self) -> &[ProcessingStep] {
        &self.steps
    }

    pub fn statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|s| s.status).collect()
    }

    /// Mark every step before `index` done, `index` in progress, the rest pending.
    pub fn advance_to(&mut self, index: usize) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.status = match i.cmp(&index) {
                std::cmp::Ordering::Less => StepStatus::Done,
                std::cmp::Ordering::Equal => StepStatus::InProgress,
                std::cmp::Ordering::Greater => StepStatus::Pending,
            };
        }
    }

    pub fn complete_all(&mut self) {
        for step in &mut self.steps {
            step.status = StepStatus::Done;
        }
    }

    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.status = StepStatus::Pending;
        }
    }

    /// The step currently in progress, if any.
    pub fn current(&self) -> Option<&ProcessingStep> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
    }

    pub fn all_done(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Done)
    }

    pub fn all_pending(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Pending)
    }

    /// Check the `Done* InProgress? Pending*` shape.
    pub fn is_well_ordered(&self) -> bool {
        is_well_ordered(&self.statuses())
    }
}

/// Check that `statuses` read `Done* InProgress? Pending*` left to right.
pub fn is_well_ordered(statuses: &[StepStatus]) -> bool {
    // 0 = in the Done prefix, 1 = seen InProgress, 2 = in the Pending suffix
    let mut stage = 0u8;
    for status in statuses {
        let next = match status {
            StepStatus::Done => 0,
            StepStatus::InProgress => 1,
            StepStatus::Pending => 2,
        };
        if next < stage || (next == 1 && stage == 1) {
            return false;
        }
        stage = next;
    }
    true
}

/// Lifecycle phase of a [`ProcessingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Complete,
    Failed,
}

/// Drives one document through the step sequence and the conversion request.
#[derive(Debug, Clone)]
pub struct ProcessingSession {
    phase: SessionPhase,
    steps: StepList,
    markdown: Option<String>,
    error: Option<UserMessage>,
    pacing: StepPacing,
}

impl ProcessingSession {
    pub fn new(pacing: StepPacing) -> Self {
        Self {
            phase: SessionPhase::Idle,
            steps: StepList::new(),
            markdown: None,
            error: None,
            pacing,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn steps(&self) -> &StepList {
        &self.steps
    }

    /// Markdown produced by the last successful run.
    pub fn markdown(&self) -> Option<&str> {
        self.markdown.as_deref()
    }

    /// Generic message of the last failed run.
    pub fn error(&self) -> Option<UserMessage> {
        self.error
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    /// Enter `Running` with all steps pending.
    ///
    /// Rejected with [`DocIntelliError::AlreadyInProgress`] while a run is
    /// active. A run whose future was dropped before it settled also stays
    /// active until [`Self::reset`]: its request may still reach the service.
    pub fn begin(&mut self) -> Result<(), DocIntelliError> {
        if self.phase == SessionPhase::Running {
            return Err(DocIntelliError::AlreadyInProgress);
        }
        self.steps.reset();
        self.markdown = None;
        self.error = None;
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Return to `Idle`, discarding steps, result and error.
    pub fn reset(&mut self) {
        self.phase = SessionPhase::Idle;
        self.steps.reset();
        self.markdown = None;
        self.error = None;
    }

    /// Run one conversion attempt for `file`.
    ///
    /// On success every step is done and [`Self::markdown`] holds the result.
    /// On failure every step is back to pending, [`Self::error`] holds the
    /// generic message and the detailed error is returned for logging.
    pub async fn run(
        &mut self,
        backend: &dyn Backend,
        file: &PdfFile,
        flags: FeatureFlags,
        observer: &dyn ProcessingObserver,
    ) -> Result<(), DocIntelliError> {
        self.begin()?;
        info!(
            "Processing '{}' (ocr={}, ai={})",
            file.name(),
            flags.ocr,
            flags.ai_summarization
        );
        observer.on_start(file.name());
        observer.on_steps(self.steps.steps());

        let mut result = None;
        for (index, kind) in StepKind::ALL.into_iter().enumerate() {
            self.steps.advance_to(index);
            observer.on_steps(self.steps.steps());
            debug!("Step {}/6: {}", index + 1, kind.label());

            match kind.delay(&self.pacing) {
                Some(delay) => pause(delay).await,
                None => {
                    let converted = backend
                        .convert(file, flags.ocr, flags.ai_summarization)
                        .await;
                    match converted {
                        Ok(markdown) => result = Some(markdown),
                        Err(e) => return Err(self.fail(e, observer)),
                    }
                }
            }
        }

        let markdown = result.unwrap_or_default();
        self.steps.complete_all();
        observer.on_steps(self.steps.steps());
        info!("Processing complete: {} bytes of Markdown", markdown.len());
        observer.on_complete(markdown.len());
        self.markdown = Some(markdown);
        self.phase = SessionPhase::Complete;
        Ok(())
    }

    fn fail(&mut self, e: DocIntelliError, observer: &dyn ProcessingObserver) -> DocIntelliError {
        error!("Processing failed: {}", e);
        self.steps.reset();
        self.error = Some(UserMessage::ProcessingFailed);
        self.phase = SessionPhase::Failed;
        observer.on_steps(self.steps.steps());
        observer.on_failure(&e);
        e
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{server_error, FakeBackend};
    use crate::progress::NoopObserver;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        snapshots: Mutex<Vec<Vec<StepStatus>>>,
    }

    impl ProcessingObserver for Recorder {
        fn on_steps(&self, steps: &[ProcessingStep]) {
            self.snapshots
                .lock()
                .unwrap()
                .push(steps.iter().map(|s| s.status).collect());
        }
    }

    fn pdf() -> PdfFile {
        PdfFile::from_bytes("paper.pdf", &b"%PDF-1.7"[..], 1024).unwrap()
    }

    use super::StepStatus::{Done as D, InProgress as I, Pending as P};

    #[test]
    fn labels_and_ai_flag() {
        let ai: Vec<_> = StepKind::ALL.iter().filter(|k| k.is_ai_step()).collect();
        assert_eq!(ai, vec![&StepKind::AiAnalyze]);
        assert_eq!(StepKind::ALL[0].slug(), "parse");
        assert_eq!(StepKind::ALL[5].slug(), "generate-markdown");
    }

    #[test]
    fn advance_to_produces_prefix_shape() {
        let mut steps = StepList::new();
        steps.advance_to(3);
        assert_eq!(steps.statuses(), vec![D, D, D, I, P, P]);
        assert_eq!(steps.current().map(|s| s.kind), Some(StepKind::AiAnalyze));
        assert!(steps.is_well_ordered());
    }

    #[test]
    fn ordering_check_rejects_gaps() {
        assert!(is_well_ordered(&[D, D, P, P]));
        assert!(is_well_ordered(&[D, D, D]));
        assert!(is_well_ordered(&[P, P]));
        assert!(!is_well_ordered(&[P, D]));
        assert!(!is_well_ordered(&[D, I, I]));
        assert!(!is_well_ordered(&[I, D]));
        assert!(!is_well_ordered(&[D, P, I]));
    }

    #[tokio::test]
    async fn successful_run_completes_every_step() {
        let backend = FakeBackend::new();
        backend.push_convert(Ok("# Title\n\n$x^2$".into()));
        let recorder = Recorder::default();
        let mut session = ProcessingSession::new(StepPacing::immediate());

        session
            .run(&backend, &pdf(), FeatureFlags::default(), &recorder)
            .await
            .unwrap();

        assert_eq!(session.phase(), SessionPhase::Complete);
        assert!(session.steps().all_done());
        assert_eq!(session.markdown(), Some("# Title\n\n$x^2$"));

        let snapshots = recorder.snapshots.lock().unwrap();
        assert!(snapshots.iter().all(|s| is_well_ordered(s)));
        assert_eq!(snapshots[1], vec![I, P, P, P, P, P]);
        assert_eq!(snapshots.last().unwrap(), &vec![D; 6]);
    }

    #[tokio::test]
    async fn failed_run_resets_steps() {
        let backend = FakeBackend::new();
        backend.push_convert(Err(server_error()));
        let recorder = Recorder::default();
        let mut session = ProcessingSession::new(StepPacing::immediate());

        let err = session
            .run(&backend, &pdf(), FeatureFlags::default(), &recorder)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(session.steps().all_pending());
        assert_eq!(session.error(), Some(UserMessage::ProcessingFailed));
        assert_eq!(session.markdown(), None);

        let snapshots = recorder.snapshots.lock().unwrap();
        // The failure happens while the AI step is in progress.
        assert!(snapshots.contains(&vec![D, D, D, I, P, P]));
        assert!(!snapshots.contains(&vec![D, D, D, D, I, P]));
        assert!(snapshots.iter().all(|s| is_well_ordered(s)));
    }

    #[tokio::test]
    async fn rerun_after_terminal_phase_starts_from_pending() {
        let backend = FakeBackend::new();
        backend.push_convert(Ok("first".into()));
        backend.push_convert(Err(server_error()));
        backend.push_convert(Ok("third".into()));
        let mut session = ProcessingSession::new(StepPacing::immediate());

        session
            .run(&backend, &pdf(), FeatureFlags::default(), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::Complete);

        let recorder = Recorder::default();
        let _ = session
            .run(&backend, &pdf(), FeatureFlags::default(), &recorder)
            .await;
        assert_eq!(recorder.snapshots.lock().unwrap()[0], vec![P; 6]);
        assert_eq!(session.markdown(), None);

        let recorder = Recorder::default();
        session
            .run(&backend, &pdf(), FeatureFlags::default(), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.snapshots.lock().unwrap()[0], vec![P; 6]);
        assert_eq!(session.markdown(), Some("third"));
    }

    #[tokio::test]
    async fn flags_reach_the_backend() {
        let backend = FakeBackend::new();
        let mut session = ProcessingSession::new(StepPacing::immediate());
        let flags = FeatureFlags {
            ocr: true,
            ai_summarization: false,
        };
        session.run(&backend, &pdf(), flags, &NoopObserver).await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].ocr);
        assert_eq!(calls[0].endpoint, "/convert_raw");
    }

    #[tokio::test]
    async fn abandoned_run_blocks_restart_until_reset() {
        let backend = FakeBackend::new();
        let mut session = ProcessingSession::new(StepPacing::default());

        // The 300ms parse pause outlives the timeout, dropping the run mid-flight.
        let outcome = tokio::time::timeout(
            Duration::from_millis(5),
            session.run(&backend, &pdf(), FeatureFlags::default(), &NoopObserver),
        )
        .await;
        assert!(outcome.is_err());
        assert!(session.is_running());
        assert!(matches!(
            session.begin(),
            Err(DocIntelliError::AlreadyInProgress)
        ));

        session.reset();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.begin().is_ok());
    }
}
