// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-level identity resolution (§4.2 startup sequence, step 1). Thin
//! wrapper around [`cp_worker_runtime::resolve_worker_id`] that supplies
//! the real hostname and a random suffix; kept separate so the pure
//! logic stays host-independent and unit-testable.

use cp_core::WorkerId;
use cp_worker_runtime::resolve_worker_id;

pub fn resolve(supplied: Option<String>) -> WorkerId {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    let random_suffix = uuid::Uuid::new_v4().to_string()[..8].to_string();
    resolve_worker_id(supplied, &hostname, &random_suffix)
}
