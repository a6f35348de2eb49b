// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hand-rolled argv parsing mirroring `udevadm control`'s flag surface.
//! No `clap`: one command per invocation, same economy as the daemon's
//! own `env::parse_cli`.

use std::time::Duration;
use thiserror::Error;
use udevbroker_broker::ControlCommand;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("unrecognized argument '{0}'")]
    UnknownArg(String),
    #[error("invalid value for --{flag}: '{value}'")]
    BadValue { flag: &'static str, value: String },
    #[error("no command given (see --help)")]
    NoCommand,
    #[error("'{0}' takes more than one command at a time")]
    MultipleCommands(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub command: Option<ControlCommand>,
    pub timeout: Option<Duration>,
    pub help: bool,
    pub version: bool,
}

/// Parse argv (excluding argv[0]) into at most one [`ControlCommand`] plus
/// the client-side round-trip timeout.
pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Args, ArgsError> {
    let mut parsed = Args::default();

    macro_rules! set_command {
        ($flag:expr, $value:expr) => {{
            if parsed.command.is_some() {
                return Err(ArgsError::MultipleCommands($flag.to_string()));
            }
            parsed.command = Some($value);
        }};
    }

    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => parsed.help = true,
            "--version" | "-V" => parsed.version = true,
            "--exit" | "-e" => set_command!("--exit", ControlCommand::Exit),
            "--reload" | "-R" => set_command!("--reload", ControlCommand::Reload),
            "--stop-exec-queue" | "-s" => {
                set_command!("--stop-exec-queue", ControlCommand::StopExecQueue)
            }
            "--start-exec-queue" | "-S" => {
                set_command!("--start-exec-queue", ControlCommand::StartExecQueue)
            }
            "--ping" => set_command!("--ping", ControlCommand::Ping),
            _ if arg.starts_with("--log-priority=") || arg.starts_with("-l") => {
                let value = strip_flag_value(&arg, "--log-priority=", "-l");
                let level: u8 = value.parse().map_err(|_| ArgsError::BadValue {
                    flag: "log-priority",
                    value: value.to_string(),
                })?;
                set_command!("--log-priority", ControlCommand::SetLogLevel { level });
            }
            _ if arg.starts_with("--property=") || arg.starts_with("-p") => {
                let value = strip_flag_value(&arg, "--property=", "-p");
                set_command!(
                    "--property",
                    ControlCommand::SetEnv {
                        assignment: value.to_string()
                    }
                );
            }
            _ if arg.starts_with("--children-max=") || arg.starts_with("-m") => {
                let value = strip_flag_value(&arg, "--children-max=", "-m");
                let max: usize = value.parse().map_err(|_| ArgsError::BadValue {
                    flag: "children-max",
                    value: value.to_string(),
                })?;
                set_command!("--children-max", ControlCommand::SetMaxChildren { max });
            }
            _ if arg.starts_with("--timeout=") || arg.starts_with("-t") => {
                let value = strip_flag_value(&arg, "--timeout=", "-t");
                let secs: u64 = value.parse().map_err(|_| ArgsError::BadValue {
                    flag: "timeout",
                    value: value.to_string(),
                })?;
                parsed.timeout = Some(Duration::from_secs(secs));
            }
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        }
    }

    Ok(parsed)
}

fn strip_flag_value<'a>(arg: &'a str, long: &str, short: &str) -> &'a str {
    arg.strip_prefix(long).unwrap_or_else(|| {
        arg.strip_prefix(short)
            .expect("caller already matched long or short prefix")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exit() {
        let args = parse(["--exit".to_string()]).unwrap();
        assert_eq!(args.command, Some(ControlCommand::Exit));
    }

    #[test]
    fn parses_log_priority_long_and_short() {
        let long = parse(["--log-priority=4".to_string()]).unwrap();
        assert_eq!(long.command, Some(ControlCommand::SetLogLevel { level: 4 }));

        let short = parse(["-l7".to_string()]).unwrap();
        assert_eq!(
            short.command,
            Some(ControlCommand::SetLogLevel { level: 7 })
        );
    }

    #[test]
    fn parses_property_assignment() {
        let args = parse(["--property=FOO=bar".to_string()]).unwrap();
        assert_eq!(
            args.command,
            Some(ControlCommand::SetEnv {
                assignment: "FOO=bar".to_string()
            })
        );
    }

    #[test]
    fn parses_timeout_independent_of_command() {
        let args = parse(["--ping".to_string(), "--timeout=10".to_string()]).unwrap();
        assert_eq!(args.command, Some(ControlCommand::Ping));
        assert_eq!(args.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn rejects_two_commands_at_once() {
        let err = parse(["--exit".to_string(), "--ping".to_string()]).unwrap_err();
        assert_eq!(err, ArgsError::MultipleCommands("--ping".to_string()));
    }

    #[test]
    fn rejects_unknown_flag() {
        let err = parse(["--bogus".to_string()]).unwrap_err();
        assert_eq!(err, ArgsError::UnknownArg("--bogus".to_string()));
    }

    #[test]
    fn rejects_malformed_children_max() {
        let err = parse(["--children-max=nope".to_string()]).unwrap_err();
        assert_eq!(
            err,
            ArgsError::BadValue {
                flag: "children-max",
                value: "nope".to_string()
            }
        );
    }
}
