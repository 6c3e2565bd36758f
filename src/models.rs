//! Data models for the analysis engine.
//!
//! This module contains the core data structures shared between the
//! orchestrator, the agents, and the report generator.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The shared input of one analysis run.
///
/// Created once per run and handed to every worker behind an `Arc`;
/// nothing mutates it after construction.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    /// The decoded report text (already extracted from its file).
    pub report_text: String,
    /// API credential passed through to the workers.
    pub api_key: String,
}

impl AnalysisInput {
    pub fn new(report_text: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            report_text: report_text.into(),
            api_key: api_key.into(),
        }
    }
}

/// A unit of analysis work.
///
/// `Some(text)` is a successful result; `None` is the absence marker used
/// for any failure of the underlying call. Implementations are invoked from
/// spawned tasks and must not rely on shared mutable state beyond the
/// immutable input they were built with.
pub trait Worker: Send + Sync {
    fn run(&self) -> BoxFuture<'_, Option<String>>;
}

/// Factory producing a worker bound to the shared input.
pub type WorkerFactory = Box<dyn FnOnce(Arc<AnalysisInput>) -> Box<dyn Worker> + Send>;

/// Factory producing the synthesis worker from the full set of
/// specialist reports. Only called once every analyzer has succeeded.
pub type SynthesisFactory = Box<dyn FnOnce(&[SpecialistReport]) -> Box<dyn Worker> + Send>;

/// One named analyzer: a unique name plus the factory for its worker.
///
/// The set of specs is fixed when a run starts; names must be unique
/// within a run.
pub struct AnalyzerSpec {
    pub name: String,
    factory: WorkerFactory,
}

impl AnalyzerSpec {
    pub fn new(name: impl Into<String>, factory: WorkerFactory) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }

    /// Instantiate the worker for this spec, bound to the shared input.
    pub fn build(self, input: Arc<AnalysisInput>) -> Box<dyn Worker> {
        (self.factory)(input)
    }
}

impl fmt::Debug for AnalyzerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerSpec")
            .field("name", &self.name)
            .finish()
    }
}

/// One successful specialist result, keyed by the analyzer name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistReport {
    /// Name of the analyzer that produced the findings.
    pub specialist: String,
    /// The findings text returned by the worker.
    pub findings: String,
}

/// The aggregated result of a fully successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReview {
    /// Specialist reports in spec submission order (not completion order).
    pub reports: Vec<SpecialistReport>,
    /// The synthesis worker's combined assessment.
    pub final_assessment: String,
}

impl CaseReview {
    /// Look up one specialist's findings by name.
    pub fn findings_for(&self, specialist: &str) -> Option<&str> {
        self.reports
            .iter()
            .find(|r| r.specialist == specialist)
            .map(|r| r.findings.as_str())
    }
}

/// Why a run ended without a final assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// One or more analyzers returned no result. Names are sorted.
    Specialists { failed: Vec<String> },
    /// Every analyzer succeeded but the synthesis stage returned no result.
    Synthesis,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Specialists { failed } => {
                write!(f, "specialists failed: {}", failed.join(", "))
            }
            FailureReason::Synthesis => write!(f, "synthesis stage failed"),
        }
    }
}

/// Terminal value of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success(CaseReview),
    PartialFailure(FailureReason),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }
}

/// Coarse phase of a run, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Specialists,
    Synthesis,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::Specialists => write!(f, "specialists"),
            Stage::Synthesis => write!(f, "synthesis"),
            Stage::Complete => write!(f, "complete"),
        }
    }
}

/// One observational progress tick. Fractions are non-decreasing within a
/// run and reach 1.0 only when the run succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub fraction: f64,
    pub label: String,
}

impl ProgressEvent {
    pub fn new(stage: Stage, fraction: f64, label: impl Into<String>) -> Self {
        Self {
            stage,
            fraction,
            label: label.into(),
        }
    }
}

/// Metadata attached to a rendered report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// When the analysis finished.
    pub generated_at: DateTime<Utc>,
    /// Name of the model used by the workers.
    pub model: String,
    /// Size of the input report in bytes.
    pub report_bytes: usize,
    /// Wall-clock duration of the run in seconds.
    pub duration_seconds: f64,
}
