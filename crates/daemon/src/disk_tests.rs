// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn free_space_reports_nonzero_for_tempdir() {
    let dir = TempDir::new().unwrap();
    let free = free_space(dir.path()).unwrap();
    assert!(free > 0);
}

#[test]
fn missing_path_errors() {
    let dir = TempDir::new().unwrap();
    assert!(free_space(&dir.path().join("nope")).is_err());
}

#[test]
fn warn_if_low_never_panics() {
    let dir = TempDir::new().unwrap();
    warn_if_low(dir.path());
    warn_if_low(&dir.path().join("nope"));
}
