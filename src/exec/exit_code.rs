// src/exec/exit_code.rs

//! Exit code interpretation.
//!
//! Pure functions shared by the real runner and test fakes, so both agree on
//! what counts as success, warning, soft failure and error.

use tracing::warn;

use crate::config::model::{Configuration, ExitCodeRule, TreatAs};
use crate::errors::{BorgkeeperError, Result, SOFT_FAIL_EXIT_CODE};

const ENGINE_ERROR_START: i32 = 2;
const ENGINE_ERROR_END: i32 = 99;
const ENGINE_WARNINGS_TREATED_AS_ERRORS: [i32; 6] = [101, 102, 104, 105, 106, 107];

/// How to read exit codes of engine invocations.
///
/// Only commands whose program equals `local_path` get engine semantics;
/// everything else treats any non-zero code as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitCodePolicy {
    pub local_path: String,
    pub rules: Vec<ExitCodeRule>,
}

impl ExitCodePolicy {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            local_path: config.local_path.clone(),
            rules: config.borg_exit_codes.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Warning,
    Error,
    SoftFailure,
}

/// Classify `exit_code` of `program`. Signals arrive as negative codes.
pub fn interpret_exit_code(
    program: &str,
    exit_code: i32,
    policy: Option<&ExitCodePolicy>,
) -> ExitStatus {
    if exit_code == 0 {
        return ExitStatus::Success;
    }
    if exit_code == SOFT_FAIL_EXIT_CODE {
        return ExitStatus::SoftFailure;
    }

    let Some(policy) = policy.filter(|p| !p.local_path.is_empty() && p.local_path == program)
    else {
        return ExitStatus::Error;
    };

    if let Some(rule) = policy.rules.iter().find(|rule| rule.code == exit_code) {
        return match rule.treat_as {
            TreatAs::Error => ExitStatus::Error,
            TreatAs::Warning => ExitStatus::Warning,
        };
    }

    if ENGINE_WARNINGS_TREATED_AS_ERRORS.contains(&exit_code)
        || exit_code < 0
        || (ENGINE_ERROR_START..=ENGINE_ERROR_END).contains(&exit_code)
    {
        ExitStatus::Error
    } else {
        ExitStatus::Warning
    }
}

/// Turn an exit code into the crate's error policy.
pub fn check_exit_code(
    command: &str,
    program: &str,
    exit_code: i32,
    policy: Option<&ExitCodePolicy>,
    output: &str,
) -> Result<()> {
    match interpret_exit_code(program, exit_code, policy) {
        ExitStatus::Success => Ok(()),
        ExitStatus::Warning => {
            warn!(command = %command, exit_code, "command finished with a warning");
            Ok(())
        }
        ExitStatus::SoftFailure => Err(BorgkeeperError::SoftFailure {
            command: command.to_string(),
        }),
        ExitStatus::Error => Err(BorgkeeperError::CommandFailed {
            command: command.to_string(),
            exit_code,
            output: output.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn borg() -> ExitCodePolicy {
        ExitCodePolicy {
            local_path: "borg".into(),
            rules: Vec::new(),
        }
    }

    #[test]
    fn non_engine_commands_fail_on_any_non_zero() {
        assert_eq!(interpret_exit_code("pg_dump", 0, None), ExitStatus::Success);
        assert_eq!(interpret_exit_code("pg_dump", 1, Some(&borg())), ExitStatus::Error);
        assert_eq!(interpret_exit_code("sh", 75, None), ExitStatus::SoftFailure);
    }

    #[test]
    fn engine_codes_follow_engine_semantics() {
        let policy = borg();
        assert_eq!(interpret_exit_code("borg", 1, Some(&policy)), ExitStatus::Warning);
        assert_eq!(interpret_exit_code("borg", 2, Some(&policy)), ExitStatus::Error);
        assert_eq!(interpret_exit_code("borg", 99, Some(&policy)), ExitStatus::Error);
        assert_eq!(interpret_exit_code("borg", 100, Some(&policy)), ExitStatus::Warning);
        assert_eq!(interpret_exit_code("borg", 101, Some(&policy)), ExitStatus::Error);
        assert_eq!(interpret_exit_code("borg", 103, Some(&policy)), ExitStatus::Warning);
        assert_eq!(interpret_exit_code("borg", -9, Some(&policy)), ExitStatus::Error);
    }

    #[test]
    fn configured_rules_override_defaults() {
        let policy = ExitCodePolicy {
            local_path: "borg".into(),
            rules: vec![
                ExitCodeRule { code: 1, treat_as: TreatAs::Error },
                ExitCodeRule { code: 2, treat_as: TreatAs::Warning },
            ],
        };
        assert_eq!(interpret_exit_code("borg", 1, Some(&policy)), ExitStatus::Error);
        assert_eq!(interpret_exit_code("borg", 2, Some(&policy)), ExitStatus::Warning);
    }

    #[test]
    fn check_exit_code_maps_statuses_to_errors() {
        assert!(check_exit_code("borg create", "borg", 1, Some(&borg()), "").is_ok());

        let soft = check_exit_code("hook", "hook", 75, None, "").unwrap_err();
        assert!(soft.is_soft_failure());

        let hard = check_exit_code("borg create", "borg", 2, Some(&borg()), "locked").unwrap_err();
        assert_eq!(hard.output(), Some("locked"));
    }
}
