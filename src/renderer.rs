//! Renderer worker: an [`Environment`] on its own thread.
//!
//! The environment is single-threaded, so each renderer owns a thread with
//! a current-thread runtime and a [`LocalSet`]. Callers talk to it through
//! a command channel:
//!
//! | Command | Reply |
//! |---------|-------|
//! | `Render` | the render's `Result<RenderResult>` |
//! | `Ping` | `()` once the worker is idle |
//!
//! Commands are handled one at a time. Shutdown is signalled outside the
//! command queue, so [`Renderer::disconnect`] also interrupts a render in
//! progress. When the worker thread exits or panics, pending and future
//! requests fail with [`RenderError::Disconnected`].
//!
//! # Example
//!
//! ```rust,ignore
//! use static_shadow_dom::prelude::*;
//!
//! let renderer = Renderer::spawn(Arc::new(modules))?;
//! let result = renderer
//!     .render(RenderRequest::new("<my-card></my-card>", ["./card.js"], options))
//!     .await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::LocalSet;

use crate::context::RenderRequest;
use crate::environment::Environment;
use crate::error::{RenderError, Result};
use crate::modules::ModuleRegistry;
use crate::result::RenderResult;

/// How long [`Renderer::spawn`] waits for the worker's ready signal.
const READY_TIMEOUT: Duration = Duration::from_secs(10);

static NEXT_WORKER: AtomicU64 = AtomicU64::new(0);

enum Command {
    Render {
        request: Box<RenderRequest>,
        reply: oneshot::Sender<Result<RenderResult>>,
    },
    Ping {
        reply: std::sync::mpsc::Sender<()>,
    },
}

/// Handle to a renderer worker thread.
pub struct Renderer {
    name: String,
    commands: mpsc::UnboundedSender<Command>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Renderer {
    /// Starts a worker thread and waits until its environment is ready.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::RendererCreation`] if the thread or its runtime
    /// cannot be started.
    pub fn spawn(modules: Arc<ModuleRegistry>) -> Result<Self> {
        let name = format!(
            "static-shadow-dom-{}",
            NEXT_WORKER.fetch_add(1, Ordering::SeqCst)
        );
        let (commands, receiver) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(modules, receiver, shutdown_rx, ready_tx))
            .map_err(|e| RenderError::RendererCreation(e.to_string()))?;

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(Ok(())) => {
                log::debug!("✅ Renderer {} ready", name);
                Ok(Self {
                    name,
                    commands,
                    shutdown,
                    worker: Mutex::new(Some(worker)),
                })
            }
            Ok(Err(e)) => {
                log::error!("❌ Renderer {} failed to start: {}", name, e);
                Err(e)
            }
            Err(e) => {
                log::error!("❌ Renderer {} did not report ready: {}", name, e);
                Err(RenderError::RendererCreation(format!(
                    "worker did not start: {}",
                    e
                )))
            }
        }
    }

    /// Thread name of the worker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renders `request` on the worker.
    ///
    /// Dropping the returned future cancels the render; the worker then
    /// discards its realm and moves on.
    pub async fn render(&self, request: RenderRequest) -> Result<RenderResult> {
        let (reply, receiver) = oneshot::channel();
        self.commands
            .send(Command::Render {
                request: Box::new(request),
                reply,
            })
            .map_err(|_| RenderError::Disconnected)?;
        receiver.await.map_err(|_| RenderError::Disconnected)?
    }

    /// Checks that the worker answers within `timeout`.
    ///
    /// A worker busy with a render answers once the render is done.
    pub fn ping(&self, timeout: Duration) -> Result<()> {
        let (reply, receiver) = std::sync::mpsc::channel();
        self.commands
            .send(Command::Ping { reply })
            .map_err(|_| RenderError::Disconnected)?;
        receiver.recv_timeout(timeout).map_err(|e| {
            RenderError::HealthCheckFailed(format!("{} did not answer: {}", self.name, e))
        })
    }

    /// Returns `true` while the worker accepts commands.
    pub fn is_connected(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Stops the worker and waits for its thread to exit.
    ///
    /// A render in progress is abandoned and its caller gets
    /// [`RenderError::Disconnected`]. Idempotent.
    pub fn disconnect(&self) {
        let worker = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(worker) = worker else {
            return;
        };
        self.shutdown.send_replace(true);
        if worker.join().is_err() {
            log::warn!("⚠️ Renderer {} panicked", self.name);
        } else {
            log::debug!("Renderer {} stopped", self.name);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}

enum RenderOutcome {
    Done(Result<RenderResult>),
    Cancelled,
    Shutdown,
}

fn run_worker(
    modules: Arc<ModuleRegistry>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut shutdown: watch::Receiver<bool>,
    ready: std::sync::mpsc::Sender<Result<()>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(RenderError::RendererCreation(e.to_string())));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let local = LocalSet::new();
    local.block_on(&runtime, async move {
        let mut environment = Environment::new(modules);
        loop {
            let command = tokio::select! {
                biased;
                _ = shutdown.wait_for(|stopped| *stopped) => break,
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            match command {
                Command::Render { request, mut reply } => {
                    let outcome = tokio::select! {
                        biased;
                        _ = shutdown.wait_for(|stopped| *stopped) => RenderOutcome::Shutdown,
                        _ = reply.closed() => RenderOutcome::Cancelled,
                        result = environment.render(*request) => RenderOutcome::Done(result),
                    };
                    match outcome {
                        RenderOutcome::Done(result) => {
                            if reply.send(result).is_err() {
                                log::debug!("Render finished after its caller left");
                            }
                        }
                        RenderOutcome::Cancelled => {
                            log::warn!("⚠️ Render cancelled by its caller, discarding realm");
                            environment.teardown();
                        }
                        RenderOutcome::Shutdown => {
                            log::warn!("⚠️ Renderer shut down during a render, discarding realm");
                            environment.teardown();
                            drop(reply);
                            break;
                        }
                    }
                }
                Command::Ping { reply } => {
                    let _ = reply.send(());
                }
            }
        }
        log::trace!("Renderer worker exiting after {} render(s)", environment.renders());
    });
}

// ============================================================================
// Unit Tests
// ============================================================================
