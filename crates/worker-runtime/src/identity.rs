// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity resolution (§4.2 startup sequence, step 1).

use cp_core::WorkerId;

/// `supplied` wins if present (the `WORKER_ID` environment variable);
/// otherwise derives `hostname-<random>`, kept pure (no env/hostname
/// lookups here) so it is exercised without a real host.
pub fn resolve_worker_id(supplied: Option<String>, hostname: &str, random_suffix: &str) -> WorkerId {
    match supplied {
        Some(id) if !id.is_empty() => WorkerId::new(id),
        _ => WorkerId::new(format!("{hostname}-{random_suffix}")),
    }
}
