//! Format packer: serializes a directory-based collection into one document.
//!
//! The packing itself is done by an external, version-pinned tool run as a
//! subprocess. This crate builds its command line, runs it to completion,
//! and turns a non-zero exit into [`OcHubError::Packing`] carrying the tool's
//! diagnostics. The [`Packer`] trait is the seam the batch coordinator is
//! written against, so tests can substitute a fake.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use ochub_shared::{OcHubError, Result, validate_packer_package};

/// Maximum bytes of tool output kept in a packing error.
const MAX_DIAGNOSTIC_LEN: usize = 4_000;

/// Packs the collection at `source_dir` into the document `dest_file`.
#[async_trait]
pub trait Packer: Send + Sync {
    async fn pack(&self, source_dir: &Path, dest_file: &Path) -> Result<()>;
}

/// Runs `<program> <leading_args...> -s <source_dir> -o <dest_file>`.
#[derive(Debug, Clone)]
pub struct CliPacker {
    program: String,
    leading_args: Vec<String>,
}

impl CliPacker {
    /// A packer with an arbitrary command line prefix.
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// `npx --yes <package> pack ...`, with `package` pinned to an exact version.
    pub fn npx(launcher: impl Into<String>, package: &str) -> Result<Self> {
        validate_packer_package(package)?;
        Ok(Self::new(
            launcher,
            vec!["--yes".into(), package.into(), "pack".into()],
        ))
    }

    /// The command line prefix, for logs.
    pub fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.leading_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Packer for CliPacker {
    #[instrument(skip_all, fields(source = %source_dir.display(), dest = %dest_file.display()))]
    async fn pack(&self, source_dir: &Path, dest_file: &Path) -> Result<()> {
        debug!(cmd = %self.describe(), "running packer");

        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("-s")
            .arg(source_dir)
            .arg("-o")
            .arg(dest_file)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                OcHubError::packing(format!("failed to spawn `{}`: {e}", self.program))
            })?;

        if !output.status.success() {
            let diagnostic = diagnostic_text(&output.stderr, &output.stdout);
            return Err(OcHubError::packing(format!(
                "`{}` exited with {}: {diagnostic}",
                self.describe(),
                output.status
            )));
        }

        if !tokio::fs::try_exists(dest_file).await.unwrap_or(false) {
            return Err(OcHubError::packing(format!(
                "`{}` exited successfully but wrote nothing to {}",
                self.describe(),
                dest_file.display()
            )));
        }

        Ok(())
    }
}

/// Prefer stderr; fall back to stdout for tools that report errors there.
fn diagnostic_text(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    };

    if text.is_empty() {
        return "no diagnostic output".into();
    }
    if text.len() <= MAX_DIAGNOSTIC_LEN {
        return text;
    }
    let mut end = MAX_DIAGNOSTIC_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… [truncated]", &text[..end])
}
