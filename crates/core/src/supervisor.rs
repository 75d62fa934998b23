//! Process supervision for the external analysis tool.
//!
//! Spawns one child process per job with both output streams piped, and
//! multiplexes them through a single channel: one reader task per stream
//! feeds [`OutputEvent`]s into a shared queue, so a silent stream can
//! never starve a busy one. `kill_on_drop(true)` ensures the child does
//! not outlive its handle.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::command::AnalysisCommand;
use crate::error::SupervisorError;

/// Which of the child's output streams a chunk arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// A single multiplexed occurrence on one of the child's streams.
#[derive(Debug)]
pub enum OutputEvent {
    /// One newline-terminated line of output.
    Line { stream: StreamKind, text: String },
    /// Reading the stream failed; the stream is truncated from here on,
    /// the process itself keeps running.
    ReadError { stream: StreamKind, message: String },
}

/// Buffered capacity of the shared output channel. Readers await free
/// slots, so a slow consumer backpressures the pipes instead of growing
/// memory.
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Handle to a running analysis process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    events: mpsc::Receiver<OutputEvent>,
}

/// Spawn the analysis command with piped output streams.
///
/// Fails with [`SupervisorError::Launch`] when the executable cannot be
/// started (missing binary, permission denied).
pub fn spawn(command: &AnalysisCommand) -> Result<ProcessHandle, SupervisorError> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.current_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &command.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(SupervisorError::Launch)?;

    let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(read_lines(stdout, StreamKind::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(read_lines(stderr, StreamKind::Stderr, tx));
    }

    Ok(ProcessHandle { child, events: rx })
}

impl ProcessHandle {
    /// Receive the next output event from either stream.
    ///
    /// Returns `None` once both streams have reached end-of-file, which
    /// happens at (or shortly after) process exit.
    pub async fn next_event(&mut self) -> Option<OutputEvent> {
        self.events.recv().await
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// `None` means the process was killed by a signal and reported no
    /// exit code.
    pub async fn wait(&mut self) -> Result<Option<i32>, SupervisorError> {
        let status = self.child.wait().await.map_err(SupervisorError::Wait)?;
        Ok(status.code())
    }

    /// Best-effort termination signal. Does not guarantee immediate
    /// exit; callers still [`wait`](Self::wait) afterwards.
    pub fn terminate(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Read one stream line by line into the shared channel until EOF.
async fn read_lines<R: AsyncRead + Unpin>(
    stream: R,
    kind: StreamKind,
    tx: mpsc::Sender<OutputEvent>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(mut text)) => {
                text.push('\n');
                if tx.send(OutputEvent::Line { stream: kind, text }).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = tx
                    .send(OutputEvent::ReadError {
                        stream: kind,
                        message: e.to_string(),
                    })
                    .await;
                break;
            }
        }
    }
}
