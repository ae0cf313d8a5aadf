//! Content fingerprints for APK artifacts.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use derive_more::{Display, From};
use globset::{Glob, GlobMatcher};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Lowercase hex MD5 digest of a file's full content.
#[derive(
    Clone, Debug, Display, From, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn content_hash<P: AsRef<Path>>(path: P) -> Result<ContentHash> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .map_err(Error::from)
        .with_msg(format!("Open {:?} for hashing failed", path))?;
    let mut buf = vec![0u8; 1024 * 64];
    let mut ctx = md5::Context::new();
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.finalize()).into())
}

static APK_GLOB: OnceLock<GlobMatcher> = OnceLock::new();

pub(crate) fn apk_matcher() -> &'static GlobMatcher {
    APK_GLOB.get_or_init(|| {
        Glob::new("*.apk")
            .map(|g| g.compile_matcher())
            .expect("static glob is valid")
    })
}

/// Lists `*.apk` files directly inside `dir`, sorted by path.
pub fn apk_files_in_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let matcher = apk_matcher();
    let mut files = Vec::new();
    for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() && matcher.is_match(entry.file_name()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Hashes every APK already present in `dir`. Unreadable files are skipped.
pub fn hash_apks_in_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<ContentHash>> {
    let files = apk_files_in_dir(dir)?;
    tracing::debug!("Hashing {} existing APK files", files.len());

    Ok(files
        .par_iter()
        .filter_map(|f| match content_hash(f) {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!("Skipping {:?}: {e}", f);
                None
            }
        })
        .collect())
}
