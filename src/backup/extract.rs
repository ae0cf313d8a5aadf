//! Copies new APKs into the backup directory.

use crate::backup::catalog::PackageCatalog;
use crate::backup::device::{InfoTool, PrivilegedShell};
use crate::backup::function_path;
use crate::backup::hasher::content_hash;
use crate::backup::metadata::PackageMetadata;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::backup::state::BackupState;
use bon::Builder;
use function_name::named;
use lazy_regex::{lazy_regex, Lazy, Regex};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

static COUNTER_SUFFIX: Lazy<Regex> = lazy_regex!(r"-\d+$");

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionOutcome {
    AlreadyPresent,
    Extracted(PathBuf),
}

/// Result of one batch. Order follows the identifiers given to the run.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub outcomes: Vec<(String, ExtractionOutcome)>,
    pub failures: Vec<(String, Error)>,
    /// Identifiers the catalog had no artifact for.
    pub missing: Vec<String>,
}

impl ExtractionReport {
    pub fn extracted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ExtractionOutcome::Extracted(_)))
            .count()
    }

    pub fn already_present_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == ExtractionOutcome::AlreadyPresent)
            .count()
    }

    pub fn outcome_of(&self, identifier: &str) -> Option<&ExtractionOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, o)| o)
    }
}

#[derive(Builder)]
pub struct Extractor<'a> {
    info_tool: &'a dyn InfoTool,
    shell: &'a dyn PrivilegedShell,
    #[builder(into)]
    backup_dir: PathBuf,
}

impl Extractor<'_> {
    /// Processes `identifiers` in order. `checkpoint` sees the state after
    /// every successful extraction. Per-package errors end up in the report.
    pub fn run<F: FnMut(&BackupState)>(
        &self,
        catalog: &PackageCatalog,
        identifiers: &[String],
        state: &mut BackupState,
        mut checkpoint: F,
    ) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for identifier in identifiers {
            let Some(apk) = catalog.path_of(identifier) else {
                tracing::warn!("{identifier}: no APK in package registry, skipped");
                report.missing.push(identifier.clone());
                continue;
            };

            match self.extract_one(identifier, apk, state) {
                Ok(outcome) => {
                    match &outcome {
                        ExtractionOutcome::AlreadyPresent => {
                            tracing::info!("{identifier}: ignored, already backed up")
                        }
                        ExtractionOutcome::Extracted(dst) => {
                            tracing::info!("{identifier}: extracted to {:?}", dst);
                            checkpoint(state);
                        }
                    }
                    report.outcomes.push((identifier.clone(), outcome));
                }
                Err(e) => {
                    tracing::warn!("{identifier}: extraction failed\n{e}");
                    report.failures.push((identifier.clone(), e));
                }
            }
        }

        report
    }

    #[named]
    pub fn extract_one(
        &self,
        identifier: &str,
        apk: &Path,
        state: &mut BackupState,
    ) -> Result<ExtractionOutcome> {
        let hash =
            content_hash(apk).with_debug_object_and_fn_name(apk.to_path_buf(), function_path!())?;
        if state.is_known(&hash) {
            return Ok(ExtractionOutcome::AlreadyPresent);
        }

        let dump = self.info_tool.badging(apk)?;
        let metadata = PackageMetadata::from_badging(identifier, &dump);
        tracing::debug!(
            "{identifier}: {:?} version {:?}",
            metadata.displayed_name(),
            metadata.version()
        );

        let dst = resolve_destination(self.backup_dir.join(metadata.file_name()));
        self.copy_artifact(apk, &dst)?;
        state.record_hash(hash);

        Ok(ExtractionOutcome::Extracted(dst))
    }

    /// Plain copy first. When that fails the copy is redone as root and the
    /// result is handed to the owner of the backup directory.
    pub fn copy_artifact(&self, src: &Path, dst: &Path) -> Result<()> {
        let plain_error = match std::fs::copy(src, dst) {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        tracing::debug!("Copy {:?} failed ({plain_error}), retrying as root", src);

        let src_arg = src.to_string_lossy();
        let dst_arg = dst.to_string_lossy();
        let owner = self.backup_dir_owner()?;

        self.shell
            .run(&["cp", &src_arg, &dst_arg])
            .and_then(|_| self.shell.run(&["chown", &owner, &dst_arg]))
            .and_then(|_| self.shell.run(&["chmod", "644", &dst_arg]))
            .map_err(|e| Error::from(plain_error).chain(e))
            .with_msg(format!("Copy {:?} to {:?} failed", src, dst))?;
        Ok(())
    }

    fn backup_dir_owner(&self) -> Result<String> {
        let md = std::fs::metadata(&self.backup_dir)
            .map_err(Error::from)
            .with_msg(format!("Read owner of {:?} failed", &self.backup_dir))?;
        Ok(format!("{}:{}", md.uid(), md.gid()))
    }
}

/// `path` when free. Otherwise any `-N` counter is removed from the stem and
/// the first unused `stem-1.apk`, `stem-2.apk`, ... is returned.
pub fn resolve_destination(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = COUNTER_SUFFIX.replace(&stem, "").into_owned();

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{base}-{counter}.apk"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
