use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Drives one external addr2line-style process per batch of offsets.
///
/// The tool is expected to print two lines per address (function name,
/// then source location) in request order; anything else degrades the
/// affected addresses to a fallback label instead of failing the batch.
pub struct BatchResolver {
    addr2line: PathBuf,
    timeout: Duration,
}

impl BatchResolver {
    pub fn new(addr2line: PathBuf, timeout: Duration) -> Self {
        Self { addr2line, timeout }
    }

    /// Resolves one batch of file-relative offsets against the binary at
    /// `lib_path`. Returns one symbol per offset, in input order.
    pub async fn resolve_batch(
        &self,
        lib_path: &Path,
        lib_name: &str,
        offsets: &[u64],
    ) -> Vec<String> {
        let lines = match self.run_resolver(lib_path, offsets).await {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!(
                    "Resolver failed for {} ({} addresses): {e}",
                    lib_path.display(),
                    offsets.len()
                );
                Vec::new()
            }
        };
        offsets
            .iter()
            .enumerate()
            .map(|(i, &offset)| match lines.get(2 * i) {
                Some(line) if !line.is_empty() => line.clone(),
                _ => fallback_label(offset, lib_name),
            })
            .collect()
    }

    async fn run_resolver(&self, lib_path: &Path, offsets: &[u64]) -> std::io::Result<Vec<String>> {
        let mut cmd = Command::new(&self.addr2line);
        cmd.arg("-e").arg(lib_path).arg("-f").arg("-C");
        for &offset in offsets {
            cmd.arg(format!("{offset:#x}"));
        }
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "resolver timed out")
            })??;
        if !output.status.success() {
            log::warn!(
                "Resolver for {} exited with {}",
                lib_path.display(),
                output.status
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(str::to_owned).collect())
    }
}

/// The synthetic symbol used when a known library's offset couldn't be
/// resolved, e.g. `"0x50 in libxul.so"`.
pub fn fallback_label(offset: u64, lib_name: &str) -> String {
    format!("{offset:#x} in {lib_name}")
}
