//! ---
//! jm_section: "04-benchmark-harness"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Benchmark orchestration, baseline correction, and the versioned store."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::env;
use std::io;
use std::path::PathBuf;
use std::process::{self, Child, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use joulemetry_common::time::WallAnchor;
use joulemetry_trace::{benchmark_file_for, Dataset, SessionRecorder, TraceReader};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::results::BenchmarkResults;
use crate::store::{BenchmarkRecord, BenchmarkStore};
use crate::{BenchError, Result};

const SAMPLER_EXECUTABLE: &str = "joulemetryd";
const SAMPLER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const SECTION_COVERAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// What to benchmark and how long to idle around it.
#[derive(Debug, Clone)]
pub struct BenchmarkPlan {
    /// Workload command line, run through the shell.
    pub command: String,
    pub notes: String,
    /// Length of each of the two idle baselines.
    pub baseline: Duration,
    /// Where the session trace and benchmark store land.
    pub session_directory: PathBuf,
}

/// A stored benchmark record together with its computed results.
#[derive(Debug)]
pub struct BenchmarkSummary {
    pub record: BenchmarkRecord,
    pub results: BenchmarkResults,
}

struct Sections {
    pre_start_ns: i64,
    pre_end_ns: i64,
    post_start_ns: i64,
    post_end_ns: i64,
    error: Option<String>,
}

/// Run one benchmark end to end.
///
/// Launches the sampler, records its trace into a session file, brackets
/// the workload with idle baselines, then appends the record to the
/// session's benchmark store and returns the computed results. The
/// sampler keeps running until the recorded trace covers the end of the
/// post-baseline, so a late final row cannot truncate the last window;
/// once it is torn down the dataset is final and a section without
/// coverage is a definitive error.
pub async fn run_benchmark(plan: BenchmarkPlan) -> Result<BenchmarkSummary> {
    let dataset = Arc::new(Dataset::new());
    let mut sampler = spawn_sampler()?;
    let stdout = sampler.stdout.take().ok_or_else(|| BenchError::Sampler {
        command: SAMPLER_EXECUTABLE.to_owned(),
        source: io::Error::new(io::ErrorKind::BrokenPipe, "sampler stdout was not captured"),
    })?;

    let recorder_dataset = Arc::clone(&dataset);
    let session_directory = plan.session_directory.clone();
    let recorder = thread::spawn(move || -> joulemetry_trace::Result<Option<String>> {
        let mut recorder = SessionRecorder::new(session_directory, recorder_dataset);
        let mut reader = TraceReader::new(stdout);
        while let Some(event) = reader.next_event()? {
            recorder.on_event(&event)?;
        }
        recorder.finish()
    });

    // Measure first, then tear the sampler down regardless of the
    // outcome so the recorder thread sees end of stream and exits.
    let sections = measure(&plan, &dataset).await;
    if let Ok(sections) = &sections {
        wait_for_coverage(&dataset, sections.post_end_ns, SECTION_COVERAGE_TIMEOUT).await;
    }
    let _ = sampler.kill();
    let _ = sampler.wait();
    let session_id = match recorder.join() {
        Ok(Ok(session_id)) => session_id,
        Ok(Err(error)) => return Err(error.into()),
        Err(_) => return Err(BenchError::RecorderPanicked),
    };
    let sections = sections?;
    let session_id = session_id.ok_or(BenchError::NoTraceData)?;

    let record = BenchmarkRecord {
        benchmark_id: Uuid::new_v4(),
        session_id: session_id.clone(),
        command: plan.command.clone(),
        notes: plan.notes.clone(),
        pre_baseline_start_ns: sections.pre_start_ns,
        pre_baseline_end_ns: sections.pre_end_ns,
        post_baseline_start_ns: sections.post_start_ns,
        post_baseline_end_ns: sections.post_end_ns,
        error: sections.error,
    };

    let results = BenchmarkResults::compute(&dataset, &record)
        .ok_or(BenchError::InsufficientSamples)?;

    let store_path = benchmark_file_for(&plan.session_directory, &session_id);
    let mut store = BenchmarkStore::open(&store_path)?;
    store.append(record.clone())?;
    info!(
        store = %store_path.display(),
        benchmark = %record.benchmark_id,
        "benchmark recorded"
    );

    Ok(BenchmarkSummary { record, results })
}

async fn measure(plan: &BenchmarkPlan, dataset: &Dataset) -> Result<Sections> {
    wait_for_first_samples(dataset, SAMPLER_STARTUP_TIMEOUT).await?;

    // One wall reading up front; every edge is a monotonic offset from
    // it, so a clock step mid-benchmark cannot corrupt the windows.
    let anchor = WallAnchor::now();

    info!(baseline = ?plan.baseline, "recording pre-baseline");
    let pre_start_ns = anchor.now_ns();
    sleep(plan.baseline).await;
    let pre_end_ns = anchor.now_ns();

    let error = run_workload(&plan.command).await?;

    info!(baseline = ?plan.baseline, "recording post-baseline");
    let post_start_ns = anchor.now_ns();
    sleep(plan.baseline).await;
    let post_end_ns = anchor.now_ns();

    Ok(Sections {
        pre_start_ns,
        pre_end_ns,
        post_start_ns,
        post_end_ns,
        error,
    })
}

/// Hold the benchmark clock until the sampler's first samples land.
async fn wait_for_first_samples(dataset: &Dataset, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if dataset.snapshot().iter().any(|series| series.initialized()) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(BenchError::NoTraceData);
        }
        sleep(Duration::from_millis(50)).await;
    }
}

/// Keep the sampler alive until every series extends past `end_ns`.
///
/// The final interval's row only lands after the interval closes, so the
/// dataset usually trails the post-baseline by one sample when the sleep
/// returns. Coverage is best effort; on timeout the compute step decides
/// whether what arrived is enough.
async fn wait_for_coverage(dataset: &Dataset, end_ns: i64, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let snapshot = dataset.snapshot();
        let covered = !snapshot.is_empty()
            && snapshot
                .iter()
                .all(|series| series.domain().is_some_and(|(_, max)| max >= end_ns));
        if covered {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("timed out waiting for the trace to cover the post-baseline");
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
}

async fn run_workload(command: &str) -> Result<Option<String>> {
    info!(command, "starting workload");
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
        .map_err(|source| BenchError::Workload {
            command: command.to_owned(),
            source,
        })?;
    if status.success() {
        Ok(None)
    } else {
        warn!(command, %status, "workload failed");
        Ok(Some(format!("workload exited with {status}")))
    }
}

fn spawn_sampler() -> Result<Child> {
    let program = sampler_program();
    debug!(program = %program.display(), "launching sampler");
    process::Command::new(&program)
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| BenchError::Sampler {
            command: program.display().to_string(),
            source,
        })
}

/// Prefer the sampler shipped beside our own executable, falling back to
/// the search path.
fn sampler_program() -> PathBuf {
    if let Ok(own) = env::current_exe() {
        if let Some(dir) = own.parent() {
            let candidate = dir.join(SAMPLER_EXECUTABLE);
            if candidate.is_file() {
                return candidate;
            }
        }
    }
    PathBuf::from(SAMPLER_EXECUTABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use joulemetry_sensors::Unit;
    use joulemetry_trace::{Sample, SeriesInfo};

    #[tokio::test]
    async fn successful_workloads_report_no_error() {
        assert_eq!(run_workload("true").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_workloads_report_their_exit_status() {
        let error = run_workload("exit 3").await.unwrap().expect("an error");
        assert!(error.contains("exited"), "unexpected message: {error}");
        assert!(error.contains('3'), "unexpected message: {error}");
    }

    #[tokio::test]
    async fn waiting_for_samples_times_out_on_an_empty_dataset() {
        let dataset = Dataset::new();
        let result = wait_for_first_samples(&dataset, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(BenchError::NoTraceData)));
    }

    #[tokio::test]
    async fn coverage_wait_returns_once_the_trace_reaches_the_mark() {
        let dataset = Dataset::new();
        dataset.register(&SeriesInfo {
            series: 2,
            heading: "cpu (W)".to_owned(),
            unit: Unit::Watts,
        });
        dataset
            .insert(&Sample {
                start_ns: 0,
                end_ns: 2_000,
                series: 2,
                value: 5.0,
                unit: Unit::Watts,
            })
            .unwrap();

        let started = std::time::Instant::now();
        wait_for_coverage(&dataset, 1_500, Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn coverage_wait_gives_up_after_the_timeout() {
        let dataset = Dataset::new();
        dataset.register(&SeriesInfo {
            series: 2,
            heading: "cpu (W)".to_owned(),
            unit: Unit::Watts,
        });

        let started = std::time::Instant::now();
        wait_for_coverage(&dataset, 1_500, Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
