//! Runs the long-lived processes of a service and shuts them down together.
//!
//! - App processes run concurrently, each receiving a shared `CancellationToken`
//! - SIGINT/SIGTERM, or the first process error, cancels the token
//! - Processes get a grace period to return after cancellation
//! - Closers run afterwards under a timeout, regardless of outcome
//!
//! # Example
//!
//! ```no_run
//! use waypoint_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Runner::new()
//!         .with_named_process("ticker", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("tick");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("cleaning up");
//!             Ok(())
//!         })
//!         .run()
//!         .await
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A boxed app process: receives the shared cancellation token.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// A boxed cleanup function run after all processes stop.
pub type Closer =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

struct NamedProcess {
    name: String,
    process: AppProcess,
}

pub struct Runner {
    processes: Vec<NamedProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    shutdown_grace: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Creates a runner with a 10 second closer timeout and a 10 second
    /// shutdown grace period.
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an unnamed app process.
    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = format!("process_{}", self.processes.len());
        self.with_named_process(name, process)
    }

    /// Adds an app process. The name shows up in shutdown and error logs.
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes.push(NamedProcess {
            name: name.into(),
            process: Box::new(|token| Box::pin(process(token))),
        });
        self
    }

    /// Adds a closer. Every closer runs, even if an earlier one fails.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// How long processes may take to return after cancellation before
    /// they are aborted.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Use an externally owned token, so callers can trigger shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs all processes until shutdown, then runs the closers.
    ///
    /// Returns the first process error, if any. A process that returns `Ok`
    /// before shutdown does not stop the others.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for NamedProcess { name, process } in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        let signal_listener = tokio::spawn(cancel_on_signal(token.clone()));

        let mut first_error = None;
        loop {
            let joined = tokio::select! {
                joined = join_set.join_next() => joined,
                _ = token.cancelled() => break,
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "app process completed");
                }
                Ok((name, Err(err))) => {
                    if token.is_cancelled() {
                        warn!(process = %name, "app process failed during shutdown: {:#}", err);
                    } else {
                        error!(process = %name, "app process error: {:#}", err);
                        first_error = Some(err.context(format!("process {} failed", name)));
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!("app process panicked: {}", err);
                    if first_error.is_none() && !token.is_cancelled() {
                        first_error = Some(anyhow::anyhow!("app process panicked: {}", err));
                    }
                    token.cancel();
                }
            }
        }

        Self::drain(&mut join_set, self.shutdown_grace).await;
        signal_listener.abort();

        if !self.closers.is_empty() {
            info!("running closers with timeout of {:?}", self.closer_timeout);
            match tokio::time::timeout(self.closer_timeout, Self::run_closers(self.closers)).await
            {
                Ok(()) => info!("all closers completed"),
                Err(_) => error!("closers timed out after {:?}", self.closer_timeout),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("application exiting normally");
                Ok(())
            }
        }
    }

    /// Waits for cancelled processes to return, aborting stragglers after `grace`.
    async fn drain(
        join_set: &mut JoinSet<(String, anyhow::Result<()>)>,
        grace: Duration,
    ) {
        let waited = tokio::time::timeout(grace, async {
            while let Some(joined) = join_set.join_next().await {
                if let Ok((name, _)) = joined {
                    debug!(process = %name, "app process stopped");
                }
            }
        })
        .await;

        if waited.is_err() {
            warn!(remaining = join_set.len(), "processes did not stop within {:?}, aborting", grace);
            join_set.shutdown().await;
        }
    }

    async fn run_closers(closers: Vec<Closer>) {
        let mut closer_set = JoinSet::new();

        for closer in closers {
            closer_set.spawn(closer());
        }

        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("closer completed successfully"),
                Ok(Err(err)) => error!("closer error: {:#}", err),
                Err(err) => error!("closer panicked: {}", err),
            }
        }
    }
}

/// Cancels `token` on SIGINT or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        received = shutdown_signal() => match received {
            Ok(signal) => {
                info!(signal, "received shutdown signal");
                token.cancel();
            }
            Err(err) => error!("error setting up signal handler: {}", err),
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
