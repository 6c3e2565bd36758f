//! Concurrent fan-out/fan-in orchestration.
//!
//! One run fans a shared input out to every configured analyzer worker,
//! collects results in completion order, and fans the successful results
//! back into a single synthesis worker. A failing analyzer is recorded as
//! data (the absence marker), never raised, so one failure cannot disturb
//! its in-flight siblings.

use crate::models::{
    AnalysisInput, AnalyzerSpec, CaseReview, FailureReason, ProgressEvent, RunOutcome,
    SpecialistReport, Stage, SynthesisFactory,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Workers complete within this progress sub-range, evenly split.
const SPECIALISTS_START: f64 = 0.20;
const SPECIALISTS_END: f64 = 0.80;
const INIT: f64 = 0.10;

/// Errors that abort a run before any worker is scheduled.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Collaborator receiving ordered progress events. Rendering is up to the
/// implementation; the engine expects no response.
pub trait ProgressReporter {
    fn report(&mut self, event: ProgressEvent);
}

/// Reporter that discards every event.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&mut self, _event: ProgressEvent) {}
}

/// Run one complete analysis: all analyzers concurrently, then synthesis.
///
/// Fails fast with [`EngineError::InvalidInput`] on an empty report, empty
/// credential, empty spec set, or duplicate spec names, before building or
/// scheduling any worker. Every scheduled worker is always awaited; in-flight
/// work is never cancelled when a sibling fails, so the final state is
/// deterministic. Synthesis runs only after all analyzers succeeded.
///
/// There are no automatic retries at any stage; re-invoking this function
/// with a fresh input is the caller's retry mechanism.
pub async fn run_analysis(
    input: AnalysisInput,
    specs: Vec<AnalyzerSpec>,
    synthesis_factory: SynthesisFactory,
    reporter: &mut dyn ProgressReporter,
) -> Result<RunOutcome, EngineError> {
    validate(&input, &specs)?;

    let total = specs.len();
    let order: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();

    reporter.report(ProgressEvent::new(
        Stage::Init,
        INIT,
        "Initializing analysis workers",
    ));

    let input = Arc::new(input);
    let mut tasks: JoinSet<Option<String>> = JoinSet::new();
    let mut task_names: HashMap<tokio::task::Id, String> = HashMap::with_capacity(total);

    for spec in specs {
        let name = spec.name.clone();
        let worker = spec.build(Arc::clone(&input));
        let handle = tasks.spawn(async move { worker.run().await });
        task_names.insert(handle.id(), name);
    }

    reporter.report(ProgressEvent::new(
        Stage::Init,
        SPECIALISTS_START,
        format!("Scheduled {} specialist consultations", total),
    ));

    // Drain the whole set before deciding anything: the result mapping is
    // complete (one entry per analyzer) before the outcome is computed, and
    // completion order is never assumed.
    let mut results: HashMap<String, Option<String>> = HashMap::with_capacity(total);
    let mut completed = 0usize;

    while let Some(joined) = tasks.join_next_with_id().await {
        let (name, result) = match joined {
            Ok((id, result)) => {
                let name = task_names.remove(&id).unwrap_or_default();
                (name, result)
            }
            Err(err) => {
                // A crashed worker task degrades to the absence marker so
                // the partial-failure contract holds for its siblings.
                let name = task_names.remove(&err.id()).unwrap_or_default();
                warn!("Worker {} crashed: {}", name, err);
                (name, None)
            }
        };

        completed += 1;
        let fraction = SPECIALISTS_START
            + (SPECIALISTS_END - SPECIALISTS_START) * (completed as f64 / total as f64);

        if result.is_none() {
            warn!("{} failed to produce a result", name);
        } else {
            debug!("{} completed ({}/{})", name, completed, total);
        }

        reporter.report(ProgressEvent::new(
            Stage::Specialists,
            fraction,
            format!("Completed {} analysis", name),
        ));
        results.insert(name, result);
    }

    let mut failed: Vec<String> = results
        .iter()
        .filter(|(_, result)| result.is_none())
        .map(|(name, _)| name.clone())
        .collect();

    if !failed.is_empty() {
        failed.sort();
        return Ok(RunOutcome::PartialFailure(FailureReason::Specialists {
            failed,
        }));
    }

    // Reorder into spec submission order so downstream rendering is
    // deterministic regardless of completion order.
    let reports: Vec<SpecialistReport> = order
        .into_iter()
        .map(|name| {
            let findings = results.remove(&name).flatten().unwrap_or_default();
            SpecialistReport {
                specialist: name,
                findings,
            }
        })
        .collect();

    reporter.report(ProgressEvent::new(
        Stage::Synthesis,
        SPECIALISTS_END,
        "Generating multidisciplinary team analysis",
    ));

    let synthesizer = synthesis_factory(&reports);
    match synthesizer.run().await {
        Some(final_assessment) => {
            reporter.report(ProgressEvent::new(
                Stage::Complete,
                1.0,
                "Analysis completed successfully",
            ));
            Ok(RunOutcome::Success(CaseReview {
                reports,
                final_assessment,
            }))
        }
        None => {
            warn!("Synthesis worker failed to produce a final assessment");
            Ok(RunOutcome::PartialFailure(FailureReason::Synthesis))
        }
    }
}

/// Check run preconditions before any worker side effect.
fn validate(input: &AnalysisInput, specs: &[AnalyzerSpec]) -> Result<(), EngineError> {
    if input.report_text.trim().is_empty() {
        return Err(EngineError::InvalidInput("report text is empty".into()));
    }
    if input.api_key.trim().is_empty() {
        return Err(EngineError::InvalidInput("API key is empty".into()));
    }
    if specs.is_empty() {
        return Err(EngineError::InvalidInput("no analyzers configured".into()));
    }

    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(EngineError::InvalidInput(format!(
                "duplicate analyzer name: {}",
                spec.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Worker;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Worker returning a fixed result, optionally after a delay.
    struct StaticWorker {
        result: Option<String>,
        delay: Option<Duration>,
    }

    impl Worker for StaticWorker {
        fn run(&self) -> BoxFuture<'_, Option<String>> {
            let result = self.result.clone();
            let delay = self.delay;
            Box::pin(async move {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                result
            })
        }
    }

    struct PanicWorker;

    impl Worker for PanicWorker {
        fn run(&self) -> BoxFuture<'_, Option<String>> {
            Box::pin(async { panic!("worker blew up") })
        }
    }

    /// Reporter that records every event for inspection.
    #[derive(Default)]
    struct Recorder {
        events: Vec<ProgressEvent>,
    }

    impl ProgressReporter for Recorder {
        fn report(&mut self, event: ProgressEvent) {
            self.events.push(event);
        }
    }

    fn spec_ok(name: &str, findings: &str) -> AnalyzerSpec {
        let findings = findings.to_string();
        AnalyzerSpec::new(
            name,
            Box::new(move |_input| {
                Box::new(StaticWorker {
                    result: Some(findings),
                    delay: None,
                })
            }),
        )
    }

    fn spec_failing(name: &str) -> AnalyzerSpec {
        AnalyzerSpec::new(
            name,
            Box::new(|_input| {
                Box::new(StaticWorker {
                    result: None,
                    delay: None,
                })
            }),
        )
    }

    fn spec_delayed(name: &str, findings: &str, delay_ms: u64) -> AnalyzerSpec {
        let findings = findings.to_string();
        AnalyzerSpec::new(
            name,
            Box::new(move |_input| {
                Box::new(StaticWorker {
                    result: Some(findings),
                    delay: Some(Duration::from_millis(delay_ms)),
                })
            }),
        )
    }

    fn input() -> AnalysisInput {
        AnalysisInput::new("patient is stable", "test-key")
    }

    /// Synthesis factory that counts invocations and captures the reports
    /// it was handed.
    fn counting_synthesis(
        result: Option<&str>,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<SpecialistReport>>>,
    ) -> SynthesisFactory {
        let result = result.map(str::to_string);
        Box::new(move |reports| {
            calls.fetch_add(1, Ordering::SeqCst);
            *seen.lock().unwrap() = reports.to_vec();
            Box::new(StaticWorker {
                result,
                delay: None,
            })
        })
    }

    fn simple_synthesis(result: Option<&str>) -> SynthesisFactory {
        let result = result.map(str::to_string);
        Box::new(move |_reports| {
            Box::new(StaticWorker {
                result,
                delay: None,
            })
        })
    }

    #[tokio::test]
    async fn all_workers_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let specs = vec![
            spec_ok("Cardiologist", "heart ok"),
            spec_ok("Psychologist", "mind ok"),
            spec_ok("Pulmonologist", "lungs ok"),
        ];

        let outcome = run_analysis(
            input(),
            specs,
            counting_synthesis(Some("combined verdict"), calls.clone(), seen.clone()),
            &mut NullReporter,
        )
        .await
        .unwrap();

        let review = match outcome {
            RunOutcome::Success(review) => review,
            other => panic!("expected success, got {:?}", other),
        };

        // Exactly one report per analyzer, in spec submission order.
        let names: Vec<&str> = review.reports.iter().map(|r| r.specialist.as_str()).collect();
        assert_eq!(names, ["Cardiologist", "Psychologist", "Pulmonologist"]);
        assert_eq!(review.findings_for("Psychologist"), Some("mind ok"));
        assert_eq!(review.final_assessment, "combined verdict");

        // Exactly one synthesis call, receiving all analyzer results.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn single_failure_blocks_synthesis() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let specs = vec![
            spec_ok("A", "ok-A"),
            spec_failing("B"),
            spec_ok("C", "ok-C"),
        ];
        let input = AnalysisInput::new("patient has elevated heart rate", "test-key");

        let outcome = run_analysis(
            input,
            specs,
            counting_synthesis(Some("unused"), calls.clone(), seen),
            &mut NullReporter,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::PartialFailure(FailureReason::Specialists {
                failed: vec!["B".to_string()],
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn multiple_failures_are_all_named_sorted() {
        let specs = vec![
            spec_failing("Pulmonologist"),
            spec_ok("Psychologist", "ok"),
            spec_failing("Cardiologist"),
        ];

        let outcome = run_analysis(input(), specs, simple_synthesis(Some("x")), &mut NullReporter)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::PartialFailure(FailureReason::Specialists {
                failed: vec!["Cardiologist".to_string(), "Pulmonologist".to_string()],
            })
        );
    }

    #[tokio::test]
    async fn all_workers_failing() {
        let specs = vec![spec_failing("A"), spec_failing("B"), spec_failing("C")];

        let outcome = run_analysis(input(), specs, simple_synthesis(Some("x")), &mut NullReporter)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::PartialFailure(FailureReason::Specialists {
                failed: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            })
        );
    }

    #[tokio::test]
    async fn synthesis_failure_is_distinct() {
        let specs = vec![spec_ok("A", "ok-A"), spec_ok("B", "ok-B")];

        let outcome = run_analysis(input(), specs, simple_synthesis(None), &mut NullReporter)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::PartialFailure(FailureReason::Synthesis)
        );
    }

    #[tokio::test]
    async fn duplicate_names_fail_fast() {
        let built = Arc::new(AtomicUsize::new(0));
        let mk = |counter: Arc<AtomicUsize>| -> AnalyzerSpec {
            AnalyzerSpec::new(
                "Cardiologist",
                Box::new(move |_input| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Box::new(StaticWorker {
                        result: Some("ok".to_string()),
                        delay: None,
                    })
                }),
            )
        };
        let specs = vec![mk(built.clone()), mk(built.clone())];

        let err = run_analysis(input(), specs, simple_synthesis(Some("x")), &mut NullReporter)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(err.to_string().contains("duplicate analyzer name"));
        // No worker was ever instantiated.
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_report_and_credential_are_rejected() {
        let err = run_analysis(
            AnalysisInput::new("  \n", "key"),
            vec![spec_ok("A", "ok")],
            simple_synthesis(Some("x")),
            &mut NullReporter,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("report text is empty"));

        let err = run_analysis(
            AnalysisInput::new("report", ""),
            vec![spec_ok("A", "ok")],
            simple_synthesis(Some("x")),
            &mut NullReporter,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("API key is empty"));
    }

    #[tokio::test]
    async fn empty_spec_set_is_rejected() {
        let err = run_analysis(
            input(),
            Vec::new(),
            simple_synthesis(Some("x")),
            &mut NullReporter,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no analyzers configured"));
    }

    #[tokio::test]
    async fn progress_reaches_one_only_on_success() {
        let specs = vec![spec_ok("A", "a"), spec_ok("B", "b")];
        let mut recorder = Recorder::default();
        run_analysis(input(), specs, simple_synthesis(Some("final")), &mut recorder)
            .await
            .unwrap();

        let fractions: Vec<f64> = recorder.events.iter().map(|e| e.fraction).collect();
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*fractions.last().unwrap(), 1.0);
        assert_eq!(recorder.events.last().unwrap().stage, Stage::Complete);

        let mut recorder = Recorder::default();
        let specs = vec![spec_ok("A", "a"), spec_failing("B")];
        run_analysis(input(), specs, simple_synthesis(Some("final")), &mut recorder)
            .await
            .unwrap();

        let fractions: Vec<f64> = recorder.events.iter().map(|e| e.fraction).collect();
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(*fractions.last().unwrap() < 1.0);
    }

    #[tokio::test]
    async fn specialist_phase_tops_out_after_last_completion() {
        let specs = vec![spec_ok("A", "a"), spec_ok("B", "b"), spec_ok("C", "c")];
        let mut recorder = Recorder::default();
        run_analysis(input(), specs, simple_synthesis(Some("final")), &mut recorder)
            .await
            .unwrap();

        let specialist_fracs: Vec<f64> = recorder
            .events
            .iter()
            .filter(|e| e.stage == Stage::Specialists)
            .map(|e| e.fraction)
            .collect();
        assert_eq!(specialist_fracs.len(), 3);
        // Top of the sub-range reached exactly at the last completion.
        assert!((specialist_fracs[2] - 0.80).abs() < 1e-9);
        assert!(specialist_fracs[0] < 0.80 && specialist_fracs[1] < 0.80);
    }

    #[tokio::test]
    async fn workers_run_concurrently() {
        let specs = vec![
            spec_delayed("A", "a", 50),
            spec_delayed("B", "b", 100),
            spec_delayed("C", "c", 150),
        ];

        let started = Instant::now();
        let outcome = run_analysis(input(), specs, simple_synthesis(Some("x")), &mut NullReporter)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(outcome.is_success());
        // Near max(delays), not sum(delays): sequential execution would
        // need at least 300ms.
        assert!(
            elapsed < Duration::from_millis(280),
            "analyzer phase took {:?}, expected concurrent execution",
            elapsed
        );
        assert!(elapsed >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn panicking_worker_becomes_partial_failure() {
        let specs = vec![
            spec_ok("A", "ok-A"),
            AnalyzerSpec::new("B", Box::new(|_input| Box::new(PanicWorker))),
            spec_ok("C", "ok-C"),
        ];

        let outcome = run_analysis(input(), specs, simple_synthesis(Some("x")), &mut NullReporter)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::PartialFailure(FailureReason::Specialists {
                failed: vec!["B".to_string()],
            })
        );
    }
}
