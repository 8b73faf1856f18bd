// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store error taxonomy, collapsing sqlx failures into the
//! shared [`cp_core::AdapterError`] classification (§4.1, §7).

use cp_core::{AdapterError, AdapterErrorKind};

/// Classifies a `sqlx::Error` into the four-way adapter error taxonomy.
pub fn classify(context: &str, err: sqlx::Error) -> AdapterError {
    let kind = match &err {
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() {
                AdapterErrorKind::Conflict
            } else {
                AdapterErrorKind::Invalid
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => AdapterErrorKind::Unavailable,
        sqlx::Error::PoolClosed => AdapterErrorKind::Unavailable,
        _ => AdapterErrorKind::Invalid,
    };
    AdapterError {
        kind,
        message: format!("{context}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_classifies_as_unavailable() {
        let err = classify("get_worker", sqlx::Error::PoolClosed);
        assert_eq!(err.kind, AdapterErrorKind::Unavailable);
    }
}
