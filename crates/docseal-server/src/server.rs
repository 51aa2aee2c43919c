// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP server lifecycle: bind, serve in a background task, and shut down
// gracefully on request.

use std::net::SocketAddr;
use std::sync::Arc;

use docseal_core::error::{DocsealError, Result};
use docseal_core::types::ServerStatus;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::routes::{AppState, build_router};

/// Embedded HTTP server.
///
/// Created `Stopped`; [`start`](Self::start) binds and begins serving,
/// [`stop`](Self::stop) lets in-flight requests finish and then returns.
pub struct DocsealServer {
    bind_address: String,
    port: u16,
    status: ServerStatus,
    /// Bound address once running (differs from `port` when it was 0).
    local_addr: Option<SocketAddr>,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
}

impl DocsealServer {
    pub fn new(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            status: ServerStatus::Stopped,
            local_addr: None,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind and start serving `state`.  A no-op when already running.
    pub async fn start(&mut self, state: AppState) -> Result<SocketAddr> {
        if let (ServerStatus::Running, Some(addr)) = (self.status, self.local_addr) {
            debug!(%addr, "server already running");
            return Ok(addr);
        }
        self.status = ServerStatus::Starting;

        let target = format!("{}:{}", self.bind_address, self.port);
        let listener = match TcpListener::bind(&target).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Error;
                error!(%target, error = %e, "bind failed");
                return Err(e.into());
            }
        };
        let addr = listener.local_addr()?;
        info!(%addr, "docseal server listening");

        let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = Arc::clone(&self.shutdown_signal);
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server terminated with error");
            }
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(addr);
        self.status = ServerStatus::Running;
        Ok(addr)
    }

    /// Signal shutdown and wait for the serve task to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }
        info!(addr = ?self.local_addr, "stopping docseal server");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| DocsealError::Internal(format!("server task join: {e}")))?;
        }
        self.status = ServerStatus::Stopped;
        self.local_addr = None;
        info!("docseal server stopped");
        Ok(())
    }
}
