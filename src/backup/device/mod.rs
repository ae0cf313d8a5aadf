//! Typed access to the device: the package manager, the APK info tool and
//! a root shell.
//!
//! Every call takes its arguments as separate values. Nothing is spliced
//! into a shell string except through [`su::shell_quote`].

pub mod aapt;
#[cfg(test)]
pub(crate) mod fake;
pub mod pm;
pub mod su;

use crate::backup::catalog::PackageCategory;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

/// Runs one command with elevated rights and returns its stdout.
pub trait PrivilegedShell {
    fn run(&self, argv: &[&str]) -> Result<String>;
}

/// Lists installed packages the way `pm list packages` does.
pub trait PackageService {
    fn list_packages(&self, category: PackageCategory) -> Result<Vec<String>>;

    fn is_installed(&self, category: PackageCategory, identifier: &str) -> Result<bool> {
        Ok(self
            .list_packages(category)?
            .iter()
            .any(|p| p == identifier))
    }
}

/// Textual dumps of an APK, as produced by `aapt dump`.
pub trait InfoTool {
    /// Label, package name and version fields.
    fn badging(&self, apk: &Path) -> Result<String>;

    /// The decoded `AndroidManifest.xml` tree.
    fn manifest(&self, apk: &Path) -> Result<String>;
}

/// Runs `program` and returns stdout, failing on a non-zero exit status.
pub(crate) fn run_tool<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> Result<String> {
    tracing::trace!(
        "Running {:?} {:?}",
        program,
        args.iter().map(|a| a.as_ref()).collect::<Vec<_>>()
    );
    let output = Command::new(program).args(args).output()?;
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(Error::Tool {
            program: program.to_string_lossy().into_owned(),
            args: args
                .iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned())
                .collect(),
            status: output.status.code(),
            stderr,
        });
    }
    if !stderr.trim().is_empty() {
        tracing::debug!("{:?} stderr: {}", program, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
