//! The single automation worker.
//!
//! The automation target is not reentrant, so every command runs on one
//! dedicated OS thread that owns the [`CommandRouter`].  Transport handlers
//! get a cloneable [`ExecutorHandle`], send a request over a bounded channel
//! and await the reply.
//!
//! ```text
//! HTTP handler ─┐
//! HTTP handler ─┼─ mpsc ──▶ "automation" thread ──▶ CommandRouter::dispatch
//! HTTP handler ─┘                    │
//!        ▲                           │
//!        └────────── oneshot ────────┘
//! ```
//!
//! A call that does not answer within the configured timeout is reported as
//! [`CommandError::AutomationTimeout`].  A call that has already started is
//! not cancelled; it still finishes on the worker before the next request
//! starts.  A call still queued when its caller gives up is dropped unrun.
//! If the worker thread has exited (for example after a panic in the automation
//! target) every request answers [`CommandError::ExecutorUnavailable`].

use std::thread::JoinHandle;
use std::time::Duration;

use driver_core::{CommandError, CommandResponse};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::application::command_router::{CommandRequest, CommandRouter};

/// Requests that may wait for the worker before senders block.
pub const QUEUE_DEPTH: usize = 64;

/// Error type for starting the executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn automation thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Job {
    request: CommandRequest,
    reply: oneshot::Sender<CommandResponse>,
}

/// Sends commands to the automation thread.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<Job>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("request", &self.request).finish()
    }
}

impl ExecutorHandle {
    /// Runs `request` on the automation thread and returns its response.
    ///
    /// Never fails: timeouts and a missing worker are turned into negative
    /// responses.
    pub async fn execute(&self, request: CommandRequest) -> CommandResponse {
        let route = request.route.clone();
        let round_trip = self.round_trip(request);

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, round_trip).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("/{route} did not complete within {limit:?}");
                    return CommandError::AutomationTimeout(limit).into();
                }
            },
            None => round_trip.await,
        };

        outcome.unwrap_or_else(|err| {
            error!("/{route}: {err}");
            err.into()
        })
    }

    async fn round_trip(&self, request: CommandRequest) -> Result<CommandResponse, CommandError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Job { request, reply })
            .await
            .map_err(|_| CommandError::ExecutorUnavailable)?;
        response.await.map_err(|_| CommandError::ExecutorUnavailable)
    }

    /// Whether the automation thread is still accepting requests.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Owns the automation thread.
#[derive(Debug)]
pub struct AutomationExecutor {
    thread: JoinHandle<()>,
}

impl AutomationExecutor {
    /// Moves `router` onto a new thread named `automation`.
    ///
    /// `timeout` bounds how long [`ExecutorHandle::execute`] waits; `None`
    /// waits forever.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Spawn`] if the OS refuses to create the thread.
    pub fn spawn(
        router: CommandRouter,
        timeout: Option<Duration>,
    ) -> Result<(Self, ExecutorHandle), ExecutorError> {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let thread = std::thread::Builder::new()
            .name("automation".to_string())
            .spawn(move || worker_loop(router, rx))?;

        info!("automation executor started");
        Ok((Self { thread }, ExecutorHandle { tx, timeout }))
    }

    /// Waits for the thread to exit.  It exits once every handle is dropped.
    pub fn join(self) {
        if self.thread.join().is_err() {
            error!("automation thread panicked");
        }
    }
}

fn worker_loop(mut router: CommandRouter, mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.blocking_recv() {
        run_job(&mut router, job);
    }
    info!("automation executor stopped");
}

fn run_job(router: &mut CommandRouter, Job { request, reply }: Job) {
    if reply.is_closed() {
        debug!("/{}: caller gone while queued, skipping", request.route);
        return;
    }
    let response = router.dispatch(&request);
    if reply.send(response).is_err() {
        debug!("/{}: caller gone before the response was ready", request.route);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::automation::MockAutomationTarget;
    use crate::infrastructure::network::stream_server::StreamControl;
    use crate::infrastructure::screen_capture::{FrameEncoder, MockScreenCapture};
    use driver_core::{DeviceCapabilities, DeviceInfo};
    use std::sync::Arc;

    fn router() -> CommandRouter {
        let info = DeviceInfo {
            name: "Test Phone".to_string(),
            model: "test".to_string(),
            os_name: "TestOS".to_string(),
            os_version: "1".to_string(),
            native_width: 100,
            native_height: 200,
            scale: 2.0,
        };
        CommandRouter::new(
            Arc::new(DeviceCapabilities::compute(&info, 47000).expect("caps")),
            Box::new(MockAutomationTarget::new()),
            Arc::new(MockScreenCapture::new()),
            FrameEncoder::new(60, 50, 100),
            Vec::new(),
            StreamControl::new(),
        )
    }

    #[test]
    fn test_spawned_worker_answers_and_exits_when_handles_drop() {
        // Arrange
        let (executor, handle) = AutomationExecutor::spawn(router(), None).expect("spawn");

        // Act
        let response = tokio_test::block_on(handle.execute(CommandRequest::new("driver", "start")));

        // Assert
        assert!(response.is_success(), "{response:?}");
        assert!(handle.is_alive());
        drop(handle);
        executor.join();
    }

    #[test]
    fn test_job_abandoned_while_queued_is_not_run() {
        // Arrange: a start whose caller already gave up
        let mut router = router();
        let (abandoned, gone) = oneshot::channel();
        drop(gone);

        // Act
        run_job(
            &mut router,
            Job {
                request: CommandRequest::new("driver", "start"),
                reply: abandoned,
            },
        );

        // Assert: no session was bound for a token nobody received
        assert!(!router.sessions().is_bound());
    }

    #[test]
    fn test_live_job_after_abandoned_one_still_runs() {
        // Arrange
        let mut router = router();
        let (abandoned, gone) = oneshot::channel();
        drop(gone);
        let (reply, mut response) = oneshot::channel();

        // Act
        run_job(
            &mut router,
            Job {
                request: CommandRequest::new("driver", "start"),
                reply: abandoned,
            },
        );
        run_job(
            &mut router,
            Job {
                request: CommandRequest::new("driver", "start"),
                reply,
            },
        );

        // Assert
        let response = response.try_recv().expect("answered");
        assert!(response.is_success(), "{response:?}");
        assert!(router.sessions().is_bound());
    }

    #[tokio::test]
    async fn test_closed_channel_is_executor_unavailable() {
        // Arrange: a handle whose receiver is already gone
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = ExecutorHandle {
            tx,
            timeout: Some(Duration::from_secs(1)),
        };

        // Act
        let response = handle.execute(CommandRequest::new("driver", "start")).await;

        // Assert
        assert_eq!(response.status, "-32");
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        // Arrange: keep the receiver alive but never answer
        let (tx, _rx) = mpsc::channel(1);
        let handle = ExecutorHandle {
            tx,
            timeout: Some(Duration::from_millis(50)),
        };

        // Act
        let response = handle.execute(CommandRequest::new("driver", "start")).await;

        // Assert
        assert_eq!(response.status, "-31");
    }

    #[tokio::test]
    async fn test_dropped_reply_is_executor_unavailable() {
        let (tx, mut rx) = mpsc::channel::<Job>(1);
        let handle = ExecutorHandle { tx, timeout: None };
        tokio::spawn(async move {
            // Receive and drop the job without replying.
            let _ = rx.recv().await;
        });

        let response = handle.execute(CommandRequest::new("info", "device")).await;

        assert_eq!(response.status, "-32");
    }
}
