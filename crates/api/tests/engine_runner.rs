//! End-to-end tests for the job engine.
//!
//! Each scenario drives `run_job` (or the queue) against a stub analysis
//! script and in-memory store fakes, then asserts on the persisted state
//! and on the events observed by session-group subscribers.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use conseq_api::engine::{JobQueue, RunnerContext};
use conseq_core::error::StoreError;
use conseq_core::job::{Alignment, JobConfig};
use conseq_core::progress::PersistPolicy;
use conseq_core::status::JobStatus;
use conseq_core::store::{FileStore, JobStore, OUTPUT_ARTIFACT_NAME, QUERY_FILE_NAME};
use conseq_core::types::DbId;
use conseq_events::Broker;

// ---------------------------------------------------------------------------
// In-memory fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryJobStore {
    configs: Mutex<HashMap<DbId, JobConfig>>,
    statuses: Mutex<Vec<JobStatus>>,
    saved: Mutex<HashMap<DbId, (String, String)>>,
    commands: Mutex<HashMap<DbId, String>>,
    fail_writes: AtomicBool,
}

impl MemoryJobStore {
    async fn insert(&self, config: JobConfig) {
        self.configs.lock().await.insert(config.id, config);
    }

    async fn status_history(&self) -> Vec<JobStatus> {
        self.statuses.lock().await.clone()
    }

    async fn saved_output(&self, job_id: DbId) -> Option<(String, String)> {
        self.saved.lock().await.get(&job_id).cloned()
    }

    async fn recorded_command(&self, job_id: DbId) -> Option<String> {
        self.commands.lock().await.get(&job_id).cloned()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn job_config(&self, job_id: DbId) -> Result<JobConfig, StoreError> {
        self.configs
            .lock()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "analysis job",
                id: job_id,
            })
    }

    async fn set_status(&self, _job_id: DbId, status: JobStatus) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Database("store offline".to_string()));
        }
        self.statuses.lock().await.push(status);
        Ok(())
    }

    async fn record_command(&self, job_id: DbId, command_line: &str) -> Result<(), StoreError> {
        self.commands
            .lock()
            .await
            .insert(job_id, command_line.to_string());
        Ok(())
    }

    async fn save_progress(&self, job_id: DbId, log: &str, error: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Database("store offline".to_string()));
        }
        self.saved
            .lock()
            .await
            .insert(job_id, (log.to_string(), error.to_string()));
        Ok(())
    }
}

struct MemoryFileStore {
    root: PathBuf,
}

impl MemoryFileStore {
    fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn job_dir(&self, job_id: DbId) -> PathBuf {
        self.root.join("jobs").join(job_id.to_string())
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn prepare_job_dir(&self, job_id: DbId) -> Result<PathBuf, StoreError> {
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn write_query_file(
        &self,
        job_id: DbId,
        sequence: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = self.job_dir(job_id).join(QUERY_FILE_NAME);
        tokio::fs::write(&path, sequence).await?;
        Ok(path)
    }

    fn output_artifact(&self, job_id: DbId) -> PathBuf {
        self.job_dir(job_id).join(OUTPUT_ARTIFACT_NAME)
    }

    async fn database_path(&self, database_id: DbId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(format!("fasta/{database_id}.fasta")))
    }

    async fn alignment_path(&self, msa_id: DbId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(format!("msa/{msa_id}.aln")))
    }

    async fn structure_path(&self, structure_id: DbId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(format!("structures/{structure_id}.pdb")))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    _dir: tempfile::TempDir,
    jobs: Arc<MemoryJobStore>,
    broker: Arc<Broker>,
    ctx: RunnerContext,
}

/// Write a stub analysis executable and assemble a runner context
/// around it.
fn harness(script_body: &str) -> Harness {
    let dir = tempfile::tempdir().expect("create temp dir");
    let script = dir.path().join("stub_analysis.sh");
    std::fs::write(&script, format!("#!/bin/sh\n{script_body}")).expect("write script");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("make script executable");

    let jobs = Arc::new(MemoryJobStore::default());
    let broker = Arc::new(Broker::new());
    let ctx = RunnerContext {
        jobs: Arc::clone(&jobs) as Arc<dyn JobStore>,
        files: Arc::new(MemoryFileStore::new(dir.path())),
        broker: Arc::clone(&broker),
        analysis_bin: script,
        analysis_home: dir.path().to_path_buf(),
        persist_policy: PersistPolicy::default(),
    };

    Harness {
        _dir: dir,
        jobs,
        broker,
        ctx,
    }
}

fn config(job_id: DbId) -> JobConfig {
    JobConfig {
        id: job_id,
        title: "conservation run".to_string(),
        query_sequence: "MKTAYIAKQR".to_string(),
        algorithm: "HMMER".to_string(),
        alignment: Some(Alignment::Program("MAFFT".to_string())),
        fasta_database: 1,
        max_homologs: 150,
        max_iterations: 3,
        max_id: 95.0,
        min_id: 35.0,
        cutoff: 0.0001,
        substitution_model: "BEST".to_string(),
        closest: false,
        maximum_likelihood: false,
        structure: None,
        query_name: None,
    }
}

/// Drain all events currently queued on a subscription.
fn drain(rx: &mut conseq_events::Subscription) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Receive events until a terminal status arrives and return it.
async fn wait_terminal(rx: &mut conseq_events::Subscription) -> String {
    loop {
        let event = rx.recv().await.expect("event before terminal status");
        let status = event["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            return status;
        }
    }
}

/// The stub script locates its `--dir` argument the same way the real
/// tool would, so it can drop the output artifact where the runner
/// expects it.
const FIND_DIR: &str = r#"
dir=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "--dir" ]; then dir="$arg"; fi
    prev="$arg"
done
"#;

// ---------------------------------------------------------------------------
// Scenario A: clean exit with the output artifact present
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_exit_with_artifact_completes() {
    let h = harness(&format!(
        "{FIND_DIR}\necho 'reading homologs'\necho 'scoring positions'\ntouch \"$dir/{OUTPUT_ARTIFACT_NAME}\"\n"
    ));
    h.jobs.insert(config(1)).await;
    let (_id, mut rx) = h.broker.join("job_sess-a").await;

    conseq_api::engine::runner::run_job(&h.ctx, 1, "sess-a", CancellationToken::new()).await;

    // Status transitions persisted in order, terminal exactly once.
    assert_eq!(
        h.jobs.status_history().await,
        vec![JobStatus::Running, JobStatus::Completed]
    );

    // Final snapshot holds the full log in arrival order.
    let (log, error) = h.jobs.saved_output(1).await.expect("saved output");
    assert_eq!(log, "reading homologs\nscoring positions\n");
    assert_eq!(error, "");

    // The command line was recorded before execution.
    let command = h.jobs.recorded_command(1).await.expect("recorded command");
    assert!(command.contains("--align MAFFT"));
    assert!(command.contains("--MAX_HOMOLOGS 150"));

    // Event sequence: start, two deltas, terminal.
    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0]["status"], "running");
    assert_eq!(events[0]["message"], "Job started");
    assert_eq!(events[1]["log_data"], "reading homologs\n");
    assert_eq!(events[2]["log_data"], "scoring positions\n");
    let last = events.last().expect("terminal event");
    assert_eq!(last["status"], "completed");
    assert_eq!(last["message"], "Job completed");
}

// ---------------------------------------------------------------------------
// Scenario B: killed process fails with captured stderr
// ---------------------------------------------------------------------------

#[tokio::test]
async fn killed_process_fails_with_captured_stderr() {
    let h = harness("echo 'fatal: database unreadable' >&2\nexit 137\n");
    h.jobs.insert(config(2)).await;
    let (_id, mut rx) = h.broker.join("job_sess-b").await;

    conseq_api::engine::runner::run_job(&h.ctx, 2, "sess-b", CancellationToken::new()).await;

    assert_eq!(
        h.jobs.status_history().await,
        vec![JobStatus::Running, JobStatus::Failed]
    );

    let (_log, error) = h.jobs.saved_output(2).await.expect("saved output");
    assert_eq!(error, "fatal: database unreadable\n");

    let events = drain(&mut rx);
    let last = events.last().expect("terminal event");
    assert_eq!(last["status"], "failed");
    assert_eq!(last["message"], "Job failed");
}

// ---------------------------------------------------------------------------
// Clean exit without the artifact is still a failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_exit_without_artifact_fails() {
    let h = harness("echo 'all done'\nexit 0\n");
    h.jobs.insert(config(3)).await;

    conseq_api::engine::runner::run_job(&h.ctx, 3, "sess-c", CancellationToken::new()).await;

    // Exit code 0, but no Consurf_Outputs.zip: the artifact check wins.
    assert_eq!(
        h.jobs.status_history().await,
        vec![JobStatus::Running, JobStatus::Failed]
    );
}

// ---------------------------------------------------------------------------
// Launch failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_binary_fails_with_terminal_event() {
    let mut h = harness("exit 0\n");
    h.ctx.analysis_bin = PathBuf::from("/nonexistent/analysis-tool");
    h.jobs.insert(config(4)).await;
    let (_id, mut rx) = h.broker.join("job_sess-d").await;

    conseq_api::engine::runner::run_job(&h.ctx, 4, "sess-d", CancellationToken::new()).await;

    assert_eq!(
        h.jobs.status_history().await,
        vec![JobStatus::Running, JobStatus::Failed]
    );

    // The launch error is captured in the error snapshot.
    let (_log, error) = h.jobs.saved_output(4).await.expect("saved output");
    assert!(error.contains("Failed to launch"));

    let events = drain(&mut rx);
    let last = events.last().expect("terminal event");
    assert_eq!(last["status"], "failed");
}

// ---------------------------------------------------------------------------
// Scenario C: fan-out ordering and no replay for late joiners
// ---------------------------------------------------------------------------

#[tokio::test]
async fn all_viewers_see_deltas_in_order_and_late_joiners_see_none() {
    let h = harness(&format!(
        "{FIND_DIR}\nfor i in 1 2 3; do echo \"step-$i\"; done\ntouch \"$dir/{OUTPUT_ARTIFACT_NAME}\"\n"
    ));
    h.jobs.insert(config(42)).await;

    let (_a, mut rx_a) = h.broker.join("job_42").await;
    let (_b, mut rx_b) = h.broker.join("job_42").await;

    conseq_api::engine::runner::run_job(&h.ctx, 42, "42", CancellationToken::new()).await;

    let deltas = |events: &[serde_json::Value]| -> Vec<String> {
        events
            .iter()
            .filter_map(|e| {
                let text = e["log_data"].as_str().unwrap_or_default();
                (!text.is_empty()).then(|| text.to_string())
            })
            .collect()
    };

    let events_a = drain(&mut rx_a);
    let events_b = drain(&mut rx_b);

    let expected = vec![
        "step-1\n".to_string(),
        "step-2\n".to_string(),
        "step-3\n".to_string(),
    ];
    assert_eq!(deltas(&events_a), expected);
    assert_eq!(deltas(&events_b), expected);

    // A viewer joining after completion receives nothing.
    let (_c, mut rx_c) = h.broker.join("job_42").await;
    assert!(rx_c.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_still_reaches_a_terminal_state() {
    let h = harness("echo 'started'\nsleep 30\n");
    h.jobs.insert(config(5)).await;
    let (_id, mut rx) = h.broker.join("job_sess-e").await;

    let cancel = CancellationToken::new();
    let ctx = h.ctx.clone();
    let task_cancel = cancel.clone();
    let run = tokio::spawn(async move {
        conseq_api::engine::runner::run_job(&ctx, 5, "sess-e", task_cancel).await;
    });

    // Give the process time to start, then cancel.
    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("runner finishes after cancellation")
        .expect("runner task");

    assert_eq!(
        h.jobs.status_history().await,
        vec![JobStatus::Running, JobStatus::Failed]
    );
    let events = drain(&mut rx);
    let last = events.last().expect("terminal event");
    assert_eq!(last["status"], "failed");
}

// ---------------------------------------------------------------------------
// Persistence failure never suppresses the terminal broadcast
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn terminal_event_is_published_even_when_the_store_is_down() {
    let h = harness("echo 'output'\nexit 1\n");
    h.jobs.insert(config(6)).await;
    h.jobs.fail_writes.store(true, Ordering::Relaxed);
    let (_id, mut rx) = h.broker.join("job_sess-f").await;

    conseq_api::engine::runner::run_job(&h.ctx, 6, "sess-f", CancellationToken::new()).await;

    // Nothing was persisted...
    assert!(h.jobs.saved_output(6).await.is_none());
    assert!(h.jobs.status_history().await.is_empty());

    // ...but live viewers still saw the whole run, terminal event
    // included.
    let events = drain(&mut rx);
    assert_eq!(events[0]["message"], "Job started");
    let last = events.last().expect("terminal event");
    assert_eq!(last["status"], "failed");
}

// ---------------------------------------------------------------------------
// Queue: FIFO dispatch, bounded concurrency, failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn queue_runs_enqueued_jobs_to_completion() {
    let h = harness(&format!(
        "{FIND_DIR}\necho 'working'\ntouch \"$dir/{OUTPUT_ARTIFACT_NAME}\"\n"
    ));
    h.jobs.insert(config(10)).await;
    h.jobs.insert(config(11)).await;

    let (_a, mut rx_a) = h.broker.join("job_s10").await;
    let (_b, mut rx_b) = h.broker.join("job_s11").await;

    let shutdown = CancellationToken::new();
    let queue = JobQueue::start(h.ctx.clone(), 1, shutdown.clone());
    queue.enqueue(10, "s10");
    queue.enqueue(11, "s11");

    let status_a = tokio::time::timeout(Duration::from_secs(10), wait_terminal(&mut rx_a))
        .await
        .expect("job 10 reaches a terminal state");
    let status_b = tokio::time::timeout(Duration::from_secs(10), wait_terminal(&mut rx_b))
        .await
        .expect("job 11 reaches a terminal state");

    assert_eq!(status_a, "completed");
    assert_eq!(status_b, "completed");

    shutdown.cancel();
}

#[tokio::test]
async fn one_failing_job_does_not_affect_others() {
    let h = harness(&format!(
        "{FIND_DIR}\ntouch \"$dir/{OUTPUT_ARTIFACT_NAME}\"\n"
    ));
    h.jobs.insert(config(20)).await;
    // Job 21 has no stored configuration at all.

    let (_a, mut rx_a) = h.broker.join("job_s20").await;

    let shutdown = CancellationToken::new();
    let queue = JobQueue::start(h.ctx.clone(), 2, shutdown.clone());
    queue.enqueue(21, "s21");
    queue.enqueue(20, "s20");

    let status = tokio::time::timeout(Duration::from_secs(10), wait_terminal(&mut rx_a))
        .await
        .expect("job 20 reaches a terminal state");

    assert_eq!(status, "completed");

    shutdown.cancel();
}

#[tokio::test]
async fn queue_cancel_terminates_a_running_job() {
    let h = harness("echo 'running'\nsleep 30\n");
    h.jobs.insert(config(30)).await;

    let (_a, mut rx) = h.broker.join("job_s30").await;

    let shutdown = CancellationToken::new();
    let queue = JobQueue::start(h.ctx.clone(), 1, shutdown.clone());
    queue.enqueue(30, "s30");

    // Wait until the job is actually running before cancelling.
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if queue.running_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job starts");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(queue.cancel(30).await);

    let status = tokio::time::timeout(Duration::from_secs(10), wait_terminal(&mut rx))
        .await
        .expect("job reaches a terminal state");

    assert_eq!(status, "failed");

    // Cancelling an unknown job is a no-op.
    assert!(!queue.cancel(999).await);

    shutdown.cancel();
}
