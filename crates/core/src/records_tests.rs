// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn instance_status_round_trips() {
    for status in [
        InstanceStatus::Unknown,
        InstanceStatus::Connected,
        InstanceStatus::Disconnected,
        InstanceStatus::Error,
    ] {
        assert_eq!(InstanceStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(InstanceStatus::parse("bogus"), None);
}

#[test]
fn instance_status_serde_matches_as_str() {
    let json = serde_json::to_string(&InstanceStatus::Connected).unwrap();
    assert_eq!(json, "\"connected\"");
}
