// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: opens the data directory and wires the backend crates into
// the state the HTTP server runs on.

pub mod app_services;
pub mod data_dir;
