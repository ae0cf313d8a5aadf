//! # apk_backup
//!
//! Incremental backup of installed Android application packages, meant to
//! run on the device itself with root access.
//!
//! ## Features
//!
//! - **Incremental**: APKs are fingerprinted by content and copied once
//! - **Readable names**: backups are named `{label}_{version}.apk` from `aapt` output
//! - **Theme filtering**: Substratum overlays and Arcus theme variants are skipped
//! - **Root fallback**: APKs are copied through `su` when the backup directory is not writable
//!
//! ## Quick Start
//!
//! ```no_run
//! use apk_backup::backup::catalog::PackageCategory;
//! use apk_backup::backup::device::aapt::{AaptInfoTool, DEFAULT_TOOL_CANDIDATES};
//! use apk_backup::backup::device::pm::PmPackageService;
//! use apk_backup::backup::device::su::SuShell;
//! use apk_backup::backup::session::{RunOptions, Session};
//! use apk_backup::backup::state::StateStore;
//!
//! let store = StateStore::new("apk_backup_state.yml");
//! let mut state = store.load_or_default()?;
//! state.backup_dir = Some("/sdcard/apks".into());
//!
//! let shell = SuShell::default();
//! let service = PmPackageService::default();
//! let info_tool = AaptInfoTool::new(AaptInfoTool::discover(DEFAULT_TOOL_CANDIDATES)?);
//!
//! let session = Session::builder()
//!     .shell(&shell)
//!     .service(&service)
//!     .info_tool(&info_tool)
//!     .build();
//! let options = RunOptions::builder().category(PackageCategory::User).build();
//! session.run(&mut state, options, |s| {
//!     let _ = store.save(s);
//! })?;
//! store.save(&state)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
