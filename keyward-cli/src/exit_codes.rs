//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell a rejected structure apart from a missing file or a
//! bad invocation without parsing stderr.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (undecodable input, failed verification).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Operating system service failed (entropy source).
/// Maps to EX_OSERR from sysexits.h.
pub const OS_ERROR: i32 = 71;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = if let Some(core) = err.downcast_ref::<keyward_core::KeywardError>() {
            if core.is_environment_fault() {
                OS_ERROR
            } else if matches!(core, keyward_core::KeywardError::InvalidConfig(_)) {
                USAGE_ERROR
            } else {
                DATA_ERROR
            }
        } else if message.contains("Failed to read") {
            INPUT_ERROR
        } else if message.contains("Invalid argument") {
            USAGE_ERROR
        } else if message.contains("Failed to decode") || message.contains("verification failed")
        {
            DATA_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
