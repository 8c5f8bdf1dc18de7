use crate::error::{FloodError, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

/// Run `script` with `input` on its stdin and return its trimmed stdout.
///
/// A script that cannot be started or exits unsuccessfully is an error.
pub fn run_capture_script(script: &str, input: &[u8]) -> Result<String> {
    let failure = |reason: String| FloodError::Script {
        script: script.to_string(),
        reason,
    };

    let mut child = Command::new(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| failure(e.to_string()))?;

    let stdin = child.stdin.take();
    let output = thread::scope(|s| {
        if let Some(mut stdin) = stdin {
            s.spawn(move || {
                // a script may exit without reading all of its input
                if let Err(e) = stdin.write_all(input) {
                    debug!("Response script stopped reading stdin: {}", e);
                }
            });
        }
        child.wait_with_output()
    })
    .map_err(|e| failure(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failure(format!("{} {}", output.status, stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
