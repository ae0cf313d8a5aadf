//! In-process stand-ins for the device collaborators.

use crate::backup::catalog::PackageCategory;
use crate::backup::device::{InfoTool, PackageService, PrivilegedShell};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn tool_error(program: &str, apk: &Path, stderr: &str) -> Error {
    Error::Tool {
        program: program.into(),
        args: vec![apk.to_string_lossy().into_owned()],
        status: Some(1),
        stderr: stderr.into(),
    }
}

/// Records every command. `cat` answers from `files`, `cp` really copies,
/// everything else succeeds silently unless its program is in `failing`.
#[derive(Default)]
pub(crate) struct FakeShell {
    pub files: HashMap<String, String>,
    pub failing: Vec<String>,
    pub commands: RefCell<Vec<Vec<String>>>,
}

impl FakeShell {
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn failing(mut self, program: &str) -> Self {
        self.failing.push(program.into());
        self
    }

    pub fn programs(&self) -> Vec<String> {
        self.commands.borrow().iter().map(|c| c[0].clone()).collect()
    }
}

impl PrivilegedShell for FakeShell {
    fn run(&self, argv: &[&str]) -> Result<String> {
        self.commands
            .borrow_mut()
            .push(argv.iter().map(|s| s.to_string()).collect());

        let fail = || Error::Privileged {
            command: argv.iter().map(|s| s.to_string()).collect(),
            stderr: "fake failure".into(),
        };
        if self.failing.iter().any(|f| f == argv[0]) {
            return Err(fail());
        }

        match argv {
            ["cat", path] => self.files.get(*path).cloned().ok_or_else(fail),
            ["cp", src, dst] => {
                std::fs::write(dst, format!("root copy of {src}"))?;
                Ok(String::new())
            }
            ["mkdir", "-p", dir] => {
                std::fs::create_dir_all(dir)?;
                Ok(String::new())
            }
            _ => Ok(String::new()),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakePackageService {
    pub packages: HashMap<PackageCategory, Vec<String>>,
    pub broken: bool,
    pub calls: RefCell<Vec<PackageCategory>>,
}

impl FakePackageService {
    pub fn with(mut self, category: PackageCategory, ids: &[&str]) -> Self {
        self.packages
            .insert(category, ids.iter().map(|s| s.to_string()).collect());
        self
    }
}

impl PackageService for FakePackageService {
    fn list_packages(&self, category: PackageCategory) -> Result<Vec<String>> {
        self.calls.borrow_mut().push(category);
        if self.broken {
            return Err(Error::Tool {
                program: "pm".into(),
                args: vec!["list".into(), "packages".into()],
                status: Some(255),
                stderr: "Can't find service: package".into(),
            });
        }
        Ok(self.packages.get(&category).cloned().unwrap_or_default())
    }
}

/// Dumps keyed by APK path; unknown paths fail like a malformed artifact.
#[derive(Default)]
pub(crate) struct FakeInfoTool {
    pub badging: HashMap<PathBuf, String>,
    pub manifests: HashMap<PathBuf, String>,
    pub manifest_calls: RefCell<Vec<PathBuf>>,
}

impl FakeInfoTool {
    pub fn with_badging<P: Into<PathBuf>>(mut self, apk: P, dump: &str) -> Self {
        self.badging.insert(apk.into(), dump.into());
        self
    }

    pub fn with_manifest<P: Into<PathBuf>>(mut self, apk: P, dump: &str) -> Self {
        self.manifests.insert(apk.into(), dump.into());
        self
    }
}

impl InfoTool for FakeInfoTool {
    fn badging(&self, apk: &Path) -> Result<String> {
        self.badging
            .get(apk)
            .cloned()
            .ok_or_else(|| tool_error("aapt", apk, "ERROR: dump failed because no AndroidManifest.xml found"))
    }

    fn manifest(&self, apk: &Path) -> Result<String> {
        self.manifest_calls.borrow_mut().push(apk.to_path_buf());
        self.manifests
            .get(apk)
            .cloned()
            .ok_or_else(|| tool_error("aapt", apk, "ERROR: no manifest"))
    }
}

/// Minimal `aapt dump badging` output.
pub(crate) fn badging_dump(package: &str, version: &str, label: &str) -> String {
    format!(
        "package: name='{package}' versionCode='1' versionName='{version}' platformBuildVersionName=''\n\
         sdkVersion:'21'\n\
         application-label:'{label}'\n\
         application: label='{label}' icon='res/mipmap/ic_launcher.png'\n"
    )
}
