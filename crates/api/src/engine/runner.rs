//! Per-job execution: `Pending → Running → {Completed | Failed}`.
//!
//! One invocation of [`run_job`] owns the job's record for the duration
//! of the run. Every terminal path persists final snapshots and
//! publishes exactly one terminal event; store failures are retried and
//! never suppress the broadcast, so live viewers always learn the
//! outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use conseq_core::command::{AlignmentInput, AnalysisCommand, AnalysisInputs};
use conseq_core::error::StoreError;
use conseq_core::job::{Alignment, JobConfig};
use conseq_core::progress::{PersistPolicy, ProgressAccumulator, ProgressEvent};
use conseq_core::status::JobStatus;
use conseq_core::store::{FileStore, JobStore};
use conseq_core::supervisor::{self, OutputEvent, ProcessHandle, StreamKind};
use conseq_core::types::DbId;
use conseq_events::Broker;

/// Retry budget for periodic progress saves.
const PERIODIC_SAVE_ATTEMPTS: u32 = 2;

/// Retry budget for the terminal save, the last chance to record the
/// outcome.
const TERMINAL_SAVE_ATTEMPTS: u32 = 5;

/// Pause between persistence retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Everything a job execution context needs, shared across jobs.
#[derive(Clone)]
pub struct RunnerContext {
    pub jobs: Arc<dyn JobStore>,
    pub files: Arc<dyn FileStore>,
    pub broker: Arc<Broker>,
    pub analysis_bin: PathBuf,
    pub analysis_home: PathBuf,
    pub persist_policy: PersistPolicy,
}

/// Broker group name for a session.
pub fn group_name(session_id: &str) -> String {
    format!("job_{session_id}")
}

/// Execute one job to a terminal state.
///
/// Never returns an error: every failure mode inside the run is
/// contained here and expressed as a `Failed` terminal state (or, when
/// the configuration itself cannot be loaded, logged and abandoned
/// before any state was announced).
pub async fn run_job(
    ctx: &RunnerContext,
    job_id: DbId,
    session_id: &str,
    cancel: CancellationToken,
) {
    let group = group_name(session_id);

    let config = match ctx.jobs.job_config(job_id).await {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(job_id, error = %e, "Cannot load job configuration");
            return;
        }
    };

    tracing::info!(job_id, title = %config.title, "Job execution starting");

    // Pending → Running: announce before spawning, then persist.
    let started =
        ProgressEvent::new(job_id, session_id, JobStatus::Running).with_message("Job started");
    ctx.broker.publish(&group, started.to_value()).await;
    if let Err(e) = ctx.jobs.set_status(job_id, JobStatus::Running).await {
        tracing::warn!(job_id, error = %e, "Failed to persist running status");
    }

    let mut acc = ProgressAccumulator::new(ctx.persist_policy.clone());

    let command = match prepare_command(ctx, &config).await {
        Ok(command) => command,
        Err(e) => {
            tracing::error!(job_id, error = %e, "Failed to prepare job inputs");
            acc.on_chunk(StreamKind::Stderr, &format!("{e}\n"));
            finish(ctx, job_id, session_id, &group, JobStatus::Failed, &acc).await;
            return;
        }
    };

    if let Err(e) = ctx.jobs.record_command(job_id, &command.command_line()).await {
        tracing::warn!(job_id, error = %e, "Failed to record command line");
    }

    let mut handle = match supervisor::spawn(&command) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(job_id, error = %e, "Analysis process failed to launch");
            acc.on_chunk(StreamKind::Stderr, &format!("{e}\n"));
            finish(ctx, job_id, session_id, &group, JobStatus::Failed, &acc).await;
            return;
        }
    };

    stream_output(ctx, job_id, session_id, &group, &mut handle, &mut acc, cancel).await;

    let exit_code = match handle.wait().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(job_id, error = %e, "Failed to reap analysis process");
            None
        }
    };

    // The artifact check is authoritative: a clean exit without the
    // output archive is still a failure.
    let artifact = ctx.files.output_artifact(job_id);
    let artifact_present = tokio::fs::try_exists(&artifact).await.unwrap_or(false);
    let status = if exit_code == Some(0) && artifact_present {
        JobStatus::Completed
    } else {
        JobStatus::Failed
    };

    tracing::info!(job_id, ?exit_code, artifact_present, status = %status, "Job finished");

    finish(ctx, job_id, session_id, &group, status, &acc).await;
}

/// Resolve all filesystem inputs and build the analysis command line.
async fn prepare_command(
    ctx: &RunnerContext,
    config: &JobConfig,
) -> Result<AnalysisCommand, StoreError> {
    let job_dir = ctx.files.prepare_job_dir(config.id).await?;
    let query_file = ctx
        .files
        .write_query_file(config.id, &config.query_sequence)
        .await?;
    let database = ctx.files.database_path(config.fasta_database).await?;

    let alignment = match &config.alignment {
        Some(Alignment::Precomputed(msa_id)) => {
            Some(AlignmentInput::Msa(ctx.files.alignment_path(*msa_id).await?))
        }
        Some(Alignment::Program(program)) => Some(AlignmentInput::Program(program.clone())),
        None => None,
    };

    let structure = match &config.structure {
        Some(s) => Some((ctx.files.structure_path(s.file).await?, s.chain.clone())),
        None => None,
    };

    let inputs = AnalysisInputs {
        query_file,
        job_dir,
        database,
        alignment,
        structure,
    };

    Ok(AnalysisCommand::build(
        ctx.analysis_bin.clone(),
        ctx.analysis_home.clone(),
        config,
        &inputs,
    ))
}

/// Drain multiplexed process output until both streams close,
/// accumulating, conditionally persisting, and publishing one delta
/// event per chunk.
async fn stream_output(
    ctx: &RunnerContext,
    job_id: DbId,
    session_id: &str,
    group: &str,
    handle: &mut ProcessHandle,
    acc: &mut ProgressAccumulator,
    cancel: CancellationToken,
) {
    let mut cancel_requested = false;
    loop {
        let event = if cancel_requested {
            handle.next_event().await
        } else {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(job_id, "Cancellation requested, terminating analysis process");
                    handle.terminate();
                    cancel_requested = true;
                    continue;
                }
                event = handle.next_event() => event,
            }
        };

        match event {
            Some(OutputEvent::Line { stream, text }) => {
                let delta = acc.on_chunk(stream, &text);

                if acc.should_persist() {
                    let (log, error) = acc.snapshot();
                    if save_progress_with_retry(
                        ctx.jobs.as_ref(),
                        job_id,
                        log,
                        error,
                        PERIODIC_SAVE_ATTEMPTS,
                    )
                    .await
                    {
                        acc.mark_persisted();
                    }
                }

                let update =
                    ProgressEvent::new(job_id, session_id, JobStatus::Running).with_delta(delta);
                ctx.broker.publish(group, update.to_value()).await;
            }
            Some(OutputEvent::ReadError { stream, message }) => {
                tracing::warn!(
                    job_id,
                    ?stream,
                    message,
                    "Output stream read failed; treating stream as truncated",
                );
            }
            None => break,
        }
    }
}

/// Enter a terminal state: persist final snapshots and status, then
/// publish the terminal event. The broadcast happens even when
/// persistence ultimately fails, so live viewers are never starved of
/// the outcome.
async fn finish(
    ctx: &RunnerContext,
    job_id: DbId,
    session_id: &str,
    group: &str,
    status: JobStatus,
    acc: &ProgressAccumulator,
) {
    let (log, error) = acc.snapshot();
    if !save_progress_with_retry(ctx.jobs.as_ref(), job_id, log, error, TERMINAL_SAVE_ATTEMPTS)
        .await
    {
        tracing::error!(job_id, "Final progress persistence failed");
    }
    if !set_status_with_retry(ctx.jobs.as_ref(), job_id, status, TERMINAL_SAVE_ATTEMPTS).await {
        tracing::error!(job_id, status = %status, "Final status persistence failed");
    }

    let message = match status {
        JobStatus::Completed => "Job completed",
        _ => "Job failed",
    };
    let event = ProgressEvent::new(job_id, session_id, status).with_message(message);
    ctx.broker.publish(group, event.to_value()).await;
}

async fn save_progress_with_retry(
    jobs: &dyn JobStore,
    job_id: DbId,
    log: &str,
    error: &str,
    attempts: u32,
) -> bool {
    for attempt in 1..=attempts {
        match jobs.save_progress(job_id, log, error).await {
            Ok(()) => return true,
            Err(e) => {
                tracing::warn!(job_id, attempt, error = %e, "Progress persistence failed");
                if attempt < attempts {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }
    false
}

async fn set_status_with_retry(
    jobs: &dyn JobStore,
    job_id: DbId,
    status: JobStatus,
    attempts: u32,
) -> bool {
    for attempt in 1..=attempts {
        match jobs.set_status(job_id, status).await {
            Ok(()) => return true,
            Err(e) => {
                tracing::warn!(job_id, attempt, error = %e, "Status persistence failed");
                if attempt < attempts {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }
    false
}
