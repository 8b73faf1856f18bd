// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uuid_id_gen_produces_distinct_values() {
    let gen = UuidIdGen;
    let a = gen.next();
    let b = gen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn worker_id_equality_against_str() {
    let id = WorkerId::new("host-abc123");
    assert_eq!(id, "host-abc123");
    assert_eq!(id, *"host-abc123".to_string());
}

#[yare::parameterized(
    short = { "abcdef", 3, "abc" },
    exact = { "abc", 3, "abc" },
    longer_limit = { "ab", 5, "ab" },
)]
fn short_truncates_as_expected(input: &str, n: usize, expected: &str) {
    let id = TaskId::new(input);
    assert_eq!(id.short(n), expected);
}

#[test]
fn display_matches_inner_string() {
    let id = QuestionId::new("q-1");
    assert_eq!(format!("{id}"), "q-1");
}
