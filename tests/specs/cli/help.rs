//! `udevbrokerctl` help/version output specs.

use crate::prelude::*;

#[test]
fn no_args_fails_with_usage_hint() {
    ctl().fails().stderr_has("no command given");
}

#[test]
fn help_flag_shows_usage() {
    ctl()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage: udevbrokerctl")
        .stdout_has("--ping");
}

#[test]
fn short_help_flag_shows_usage() {
    ctl().args(&["-h"]).passes().stdout_has("Usage:");
}

#[test]
fn version_flag_shows_exact_version_line() {
    ctl()
        .args(&["--version"])
        .passes()
        .stdout_eq("udevbrokerctl 0.1.0\n");
}
