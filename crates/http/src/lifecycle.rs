//! Process lifecycle of the HTTP server.
//!
//! ```text
//! Starting -> Listening -> Draining -> Stopped
//! ```
//!
//! `Starting` covers everything before the listener is serving (store
//! connection, module init, migrations). A termination signal moves the server to
//! `Draining`: no new connections are accepted and in-flight requests get up to
//! the drain timeout to finish. Connections still open after that are closed.
//! Whoever owns the process marks `Stopped` once the
//! modules have released their resources.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::Service;

/// Pause after a failed `accept`, e.g. when the process is out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Listening,
    Draining,
    Stopped,
}

/// How the drain period ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every connection finished within the timeout.
    Completed,
    /// The timeout expired with requests still in flight. Their connections were
    /// closed without a response and their handlers dropped.
    TimedOut,
}

/// Tracks the server phase and runs the bounded drain.
#[derive(Clone)]
pub struct Lifecycle {
    phase: Arc<watch::Sender<Phase>>,
    drain_timeout: Duration,
}

impl Lifecycle {
    pub fn new(drain_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(Phase::Starting);
        Self {
            phase: Arc::new(phase),
            drain_timeout,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase change.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    fn transition(&self, next: Phase) {
        let previous = self.phase.send_replace(next);
        tracing::info!(from = ?previous, to = ?next, "lifecycle transition");
    }

    /// Resources are released; nothing else runs after this.
    pub fn mark_stopped(&self) {
        self.transition(Phase::Stopped);
    }

    /// Serve `app` on `listener` until `shutdown` resolves, then drain.
    ///
    /// Every connection runs in a task owned by this call. Returns once every
    /// connection closed, or once the drain timeout expired and the remaining
    /// connection tasks were aborted. A timeout is reported through
    /// [`DrainOutcome::TimedOut`] and is not an error.
    pub async fn serve<F>(
        &self,
        listener: TcpListener,
        app: Router,
        shutdown: F,
    ) -> anyhow::Result<DrainOutcome>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        self.transition(Phase::Listening);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to accept connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    let router = app.clone();
                    let service = hyper::service::service_fn(move |request: axum::http::Request<Incoming>| {
                        router.clone().call(request)
                    });
                    let connection = graceful.watch(
                        http1::Builder::new().serve_connection(TokioIo::new(stream), service),
                    );

                    connections.spawn(async move {
                        if let Err(err) = connection.await {
                            tracing::debug!(error = %err, %remote, "connection closed with error");
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown => break,
            }
        }

        drop(listener);
        self.transition(Phase::Draining);
        tracing::info!(
            connections = connections.len(),
            timeout_ms = self.drain_timeout.as_millis() as u64,
            "draining in-flight requests"
        );

        match tokio::time::timeout(self.drain_timeout, graceful.shutdown()).await {
            Ok(()) => {
                while connections.join_next().await.is_some() {}
                tracing::info!("all connections drained");
                Ok(DrainOutcome::Completed)
            }
            Err(_) => {
                tracing::warn!(
                    connections = connections.len(),
                    timeout_ms = self.drain_timeout.as_millis() as u64,
                    "drain timed out; closing remaining connections"
                );
                connections.shutdown().await;
                Ok(DrainOutcome::TimedOut)
            }
        }
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C elsewhere).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("received SIGINT");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("received SIGTERM");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
