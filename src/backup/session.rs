//! One backup run, from the backup directory to the final summary.

use crate::backup::catalog::{build_catalog, list_installed, PackageCategory};
use crate::backup::device::{InfoTool, PackageService, PrivilegedShell};
use crate::backup::extract::{ExtractionReport, Extractor};
use crate::backup::filter::{apply_filters, FilterOptions};
use crate::backup::hasher::hash_apks_in_dir;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::state::BackupState;
use crate::backup::validate::validate_writable_dir;
use bon::Builder;
use std::path::Path;
use std::time::Instant;

#[derive(Clone, Copy, Debug, Builder, PartialEq, Eq)]
pub struct RunOptions {
    pub category: PackageCategory,
    #[builder(default)]
    pub filters: FilterOptions,
}

/// The device collaborators used by a run.
#[derive(Builder)]
pub struct Session<'a> {
    shell: &'a dyn PrivilegedShell,
    service: &'a dyn PackageService,
    info_tool: &'a dyn InfoTool,
}

impl Session<'_> {
    /// Errors returned here are setup errors. Per-package failures are in the
    /// report.
    pub fn run<F: FnMut(&BackupState)>(
        &self,
        state: &mut BackupState,
        options: RunOptions,
        checkpoint: F,
    ) -> Result<ExtractionReport> {
        let started = Instant::now();
        let backup_dir = state.backup_dir.clone().ok_or(Error::MissingBackupDir)?;

        self.prepare_backup_dir(&backup_dir)?;
        seed_known_hashes(state, &backup_dir)?;

        let catalog = build_catalog(self.shell)?;
        let identifiers = list_installed(self.service, options.category)?;
        let identifiers = apply_filters(
            state,
            self.service,
            self.info_tool,
            &catalog,
            identifiers,
            options.filters,
        )?;
        tracing::info!(
            "Backing up {} {} packages to {:?}",
            identifiers.len(),
            options.category,
            &backup_dir
        );

        let report = Extractor::builder()
            .info_tool(self.info_tool)
            .shell(self.shell)
            .backup_dir(&backup_dir)
            .build()
            .run(&catalog, &identifiers, state, checkpoint);

        tracing::info!(
            "Finished in {:.1?}: {} extracted, {} ignored, {} failed, {} without APK",
            started.elapsed(),
            report.extracted_count(),
            report.already_present_count(),
            report.failures.len(),
            report.missing.len()
        );
        Ok(report)
    }

    fn prepare_backup_dir(&self, dir: &Path) -> Result<()> {
        let Err(e) = validate_writable_dir(dir) else {
            return Ok(());
        };
        tracing::warn!("{e}, retrying as root");

        let dir_arg = dir.to_string_lossy();
        self.shell
            .run(&["mkdir", "-p", &dir_arg])
            .map_err(|e2| Error::from(e).chain(e2))
            .with_msg(format!("Create backup dir {:?} failed", dir))?;
        Ok(())
    }
}

/// A fresh state adopts whatever APKs already sit in the backup directory.
pub fn seed_known_hashes(state: &mut BackupState, backup_dir: &Path) -> Result<()> {
    if !state.known_hashes.is_empty() {
        return Ok(());
    }
    let hashes = hash_apks_in_dir(backup_dir)
        .with_msg(format!("Hash existing backups in {:?} failed", backup_dir))?;
    if !hashes.is_empty() {
        tracing::info!("Adopted {} existing backups from {:?}", hashes.len(), backup_dir);
    }
    hashes.into_iter().for_each(|h| {
        state.record_hash(h);
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::catalog::PACKAGE_REGISTRY;
    use crate::backup::device::fake::{badging_dump, FakeInfoTool, FakePackageService, FakeShell};
    use crate::backup::extract::ExtractionOutcome;
    use crate::backup::filter::{OVERLAY_ENGINE_PACKAGE, OVERLAY_MARKER};
    use crate::backup::hasher::content_hash;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Device {
        temp_dir: TempDir,
        shell: FakeShell,
        service: FakePackageService,
        info_tool: FakeInfoTool,
    }

    /// Installs `(id, label, content)` user apps, each in its own
    /// `/data/app/<id>-1/base.apk` directory.
    fn device(apps: &[(&str, &str, &str)]) -> Device {
        let temp_dir = TempDir::new().unwrap();
        let mut xml = String::from("<packages>\n");
        let mut info_tool = FakeInfoTool::default();
        for (id, label, content) in apps {
            let code_path = temp_dir.path().join(format!("data/app/{id}-1"));
            std::fs::create_dir_all(&code_path).unwrap();
            let apk = code_path.join("base.apk");
            std::fs::write(&apk, content).unwrap();
            xml.push_str(&format!(
                "<package name=\"{id}\" codePath=\"{}\" flags=\"0\">\n",
                code_path.display()
            ));
            info_tool = info_tool
                .with_badging(&apk, &badging_dump(id, "1.0", label))
                .with_manifest(&apk, "E: manifest\n");
        }
        xml.push_str("</packages>\n");
        let ids: Vec<&str> = apps.iter().map(|(id, _, _)| *id).collect();

        Device {
            shell: FakeShell::default().with_file(PACKAGE_REGISTRY, &xml),
            service: FakePackageService::default().with(PackageCategory::User, &ids),
            info_tool,
            temp_dir,
        }
    }

    impl Device {
        fn session(&self) -> Session<'_> {
            Session::builder()
                .shell(&self.shell)
                .service(&self.service)
                .info_tool(&self.info_tool)
                .build()
        }

        fn apk(&self, id: &str) -> PathBuf {
            self.temp_dir.path().join(format!("data/app/{id}-1/base.apk"))
        }

        fn backup_dir(&self) -> PathBuf {
            self.temp_dir.path().join("sdcard/apks")
        }
    }

    fn user_run() -> RunOptions {
        RunOptions::builder().category(PackageCategory::User).build()
    }

    #[test]
    fn test_run_creates_dir_and_extracts_new_packages() {
        let dev = device(&[("com.a", "A", "aaa"), ("com.b", "B", "bbb")]);
        let mut state = BackupState {
            backup_dir: Some(dev.backup_dir()),
            ..Default::default()
        };
        state.record_hash(content_hash(dev.apk("com.a")).unwrap());
        let mut checkpoints = 0;

        let report = dev
            .session()
            .run(&mut state, user_run(), |_| checkpoints += 1)
            .unwrap();

        assert_eq!(report.outcome_of("com.a"), Some(&ExtractionOutcome::AlreadyPresent));
        assert_eq!(
            report.outcome_of("com.b"),
            Some(&ExtractionOutcome::Extracted(dev.backup_dir().join("B_1.0.apk")))
        );
        assert_eq!(checkpoints, 1);
        assert_eq!(state.known_hashes.len(), 2);
        assert_eq!(state.overlay_engine, Some(false));
        assert_eq!(state.variant_engine, Some(false));
    }

    #[test]
    fn test_fresh_state_adopts_existing_backups() {
        let dev = device(&[("com.a", "A", "aaa"), ("com.b", "B", "bbb")]);
        std::fs::create_dir_all(dev.backup_dir()).unwrap();
        std::fs::copy(dev.apk("com.a"), dev.backup_dir().join("A_1.0.apk")).unwrap();
        let mut state = BackupState {
            backup_dir: Some(dev.backup_dir()),
            ..Default::default()
        };

        let report = dev.session().run(&mut state, user_run(), |_| {}).unwrap();

        assert_eq!(report.already_present_count(), 1);
        assert_eq!(report.extracted_count(), 1);
    }

    #[test]
    fn test_missing_backup_dir_is_setup_error() {
        let dev = device(&[("com.a", "A", "aaa")]);
        let mut state = BackupState::default();

        let err = dev.session().run(&mut state, user_run(), |_| {}).unwrap_err();
        assert!(matches!(err, Error::MissingBackupDir));
    }

    #[test]
    fn test_unreadable_registry_is_setup_error() {
        let dev = device(&[("com.a", "A", "aaa")]);
        let shell = FakeShell::default();
        let session = Session::builder()
            .shell(&shell)
            .service(&dev.service)
            .info_tool(&dev.info_tool)
            .build();
        let mut state = BackupState {
            backup_dir: Some(dev.backup_dir()),
            ..Default::default()
        };

        assert!(session.run(&mut state, user_run(), |_| {}).is_err());
        assert!(state.known_hashes.is_empty());
    }

    #[test]
    fn test_backup_dir_creation_falls_back_to_root() {
        let dev = device(&[]);
        let blocker = dev.temp_dir.path().join("blocker");
        std::fs::write(&blocker, "file in the way").unwrap();
        let mut state = BackupState {
            backup_dir: Some(blocker.join("apks")),
            ..Default::default()
        };

        let err = dev.session().run(&mut state, user_run(), |_| {}).unwrap_err();

        assert!(err.to_string().contains("Create backup dir"));
        assert_eq!(dev.shell.programs(), vec!["mkdir"]);
    }

    #[test]
    fn test_overlay_engine_filters_overlays() {
        let mut dev = device(&[("com.a", "A", "aaa"), ("com.theme", "Theme", "ttt")]);
        dev.service = dev
            .service
            .with(PackageCategory::System, &[OVERLAY_ENGINE_PACKAGE]);
        let theme_apk = dev.apk("com.theme");
        dev.info_tool = dev
            .info_tool
            .with_manifest(theme_apk, &format!("A: android:name=\"{OVERLAY_MARKER}\""));
        let mut state = BackupState {
            backup_dir: Some(dev.backup_dir()),
            ..Default::default()
        };

        let report = dev.session().run(&mut state, user_run(), |_| {}).unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].0, "com.a");
        assert_eq!(state.overlay_engine, Some(true));
    }
}
