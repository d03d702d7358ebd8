//! Process transport — how a job's command reaches a shell.
//!
//! Only local execution exists; jobs run on the machine hosting the executor.

pub mod local;

use std::collections::BTreeMap;

/// Exit status of a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code, or -1 when the process was killed by a signal
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn signalled(&self) -> bool {
        self.exit_code == -1
    }
}

/// Reject environments that cannot be handed to `execve`.
pub fn validate_env(env: &BTreeMap<String, String>) -> Result<(), String> {
    for (key, value) in env {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(format!("invalid variable name {:?}", key));
        }
        if value.contains('\0') {
            return Err(format!("value of {} contains a NUL byte", key));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_output_success() {
        assert!(ExecOutput { exit_code: 0 }.success());
        assert!(!ExecOutput { exit_code: 1 }.success());
        let sig = ExecOutput { exit_code: -1 };
        assert!(!sig.success());
        assert!(sig.signalled());
    }

    #[test]
    fn test_validate_env_rejects_bad_keys_and_values() {
        let mut env = BTreeMap::new();
        env.insert("OK".to_string(), "fine".to_string());
        assert!(validate_env(&env).is_ok());

        env.insert("A=B".to_string(), "x".to_string());
        assert!(validate_env(&env).unwrap_err().contains("A=B"));

        let mut env = BTreeMap::new();
        env.insert("NUL".to_string(), "a\0b".to_string());
        assert!(validate_env(&env).unwrap_err().contains("NUL"));

        let mut env = BTreeMap::new();
        env.insert(String::new(), "x".to_string());
        assert!(validate_env(&env).is_err());
    }
}
