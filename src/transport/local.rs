//! Local execution transport.

use super::ExecOutput;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

/// Run `command` through `/bin/sh -c` with exactly `env` as its environment.
///
/// stdout/stderr are inherited so job output reaches the terminal as it is
/// produced. The working directory is the executor's.
pub async fn exec_shell(command: &str, env: &BTreeMap<String, String>) -> Result<ExecOutput, String> {
    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| format!("failed to spawn /bin/sh: {}", e))?;

    let status = child
        .wait()
        .await
        .map_err(|e| format!("wait error: {}", e))?;

    Ok(ExecOutput {
        exit_code: status.code().unwrap_or(-1),
    })
}
