// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn core_errors_pass_through_unchanged() {
    let err: Error = lx_core::Error::MessageNotFound("42".into()).into();
    assert_eq!(
        err.to_string(),
        lx_core::Error::MessageNotFound("42".into()).to_string()
    );
}

#[test]
fn api_errors_are_prefixed() {
    let err: Error = ApiError::Rejected {
        code: 403,
        message: "forbidden".into(),
    }
    .into();
    assert_eq!(
        err.to_string(),
        "api error: rejected by server (code 403): forbidden"
    );
}

#[test]
fn config_errors_convert() {
    let err: Error = ConfigError::Invalid("no endpoints".into()).into();
    assert!(matches!(err, Error::Config(ConfigError::Invalid(_))));
}
