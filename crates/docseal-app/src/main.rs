// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docseal: document generation, e-signature, sealing and public
// verification behind one HTTP service.
//
// Entry point: initialise tracing, wire the services, serve until Ctrl-C.

mod services;

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use services::app_services::AppServices;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Docseal starting");

    let services = match AppServices::init() {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "failed to initialise services");
            return ExitCode::FAILURE;
        }
    };
    info!(
        data_dir = %services.data_dir().display(),
        issuer = %services.config().issuer,
        "services ready"
    );

    let mut server = services.server();
    let addr = match server.start(services.state()).await {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "failed to start server");
            services.audit("server_start", false, Some(&e.to_string()));
            return ExitCode::FAILURE;
        }
    };
    services.audit("server_start", true, Some(&addr.to_string()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");

    let stopped = server.stop().await;
    services.audit("server_stop", stopped.is_ok(), None);
    match stopped {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server did not stop cleanly");
            ExitCode::FAILURE
        }
    }
}
