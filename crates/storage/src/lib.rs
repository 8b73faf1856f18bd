// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cp-storage: the durable `Store` adapter (Postgres via `sqlx`) plus an
//! in-memory fake for tests (§4.1, §6).

pub mod error;
pub mod postgres;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use postgres::PgStore;
pub use store::{EventRow, QuestionRow, Store};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStore, StoreCall};
