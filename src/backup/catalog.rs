//! Installed packages and where their APKs live.

use crate::backup::device::{PackageService, PrivilegedShell};
use crate::backup::hasher::apk_files_in_dir;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use derive_more::{Deref, Display, From};
use lazy_regex::{lazy_regex, Lazy, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Package registry kept by the system package manager.
pub static PACKAGE_REGISTRY: &str = "/data/system/packages.xml";

static REGISTRY_PACKAGE_NAME: Lazy<Regex> = lazy_regex!(r#"<package name="(.*?)""#);
static REGISTRY_CODE_PATH: Lazy<Regex> = lazy_regex!(r#"codePath="(.*?)""#);

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum PackageCategory {
    #[display("user")]
    User,
    #[display("system")]
    System,
    #[display("disabled")]
    Disabled,
    #[display("all")]
    All,
}

impl PackageCategory {
    /// Filter flag understood by `pm list packages`.
    pub fn pm_flag(self) -> Option<&'static str> {
        match self {
            PackageCategory::User => Some("-3"),
            PackageCategory::System => Some("-s"),
            PackageCategory::Disabled => Some("-d"),
            PackageCategory::All => None,
        }
    }
}

/// Package identifier to installed APK path.
#[derive(Clone, Debug, Default, Deref, From, PartialEq, Eq)]
pub struct PackageCatalog(HashMap<String, PathBuf>);

impl PackageCatalog {
    pub fn path_of(&self, identifier: &str) -> Option<&Path> {
        self.0.get(identifier).map(PathBuf::as_path)
    }

    /// Builds the catalog from `packages.xml` content. Later duplicates
    /// replace earlier ones; entries without a single APK are dropped.
    pub fn from_registry(xml: &str) -> Self {
        let mut catalog = HashMap::new();
        for (name, code_path) in parse_registry(xml) {
            match resolve_artifact(&code_path) {
                Some(apk) => {
                    catalog.insert(name, apk);
                }
                None => tracing::debug!("Skipping {name}: no single APK under {:?}", code_path),
            }
        }
        Self(catalog)
    }
}

impl<S: Into<String>, P: Into<PathBuf>> FromIterator<(S, P)> for PackageCatalog {
    fn from_iter<I: IntoIterator<Item = (S, P)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(s, p)| (s.into(), p.into()))
                .collect(),
        )
    }
}

/// `(name, codePath)` of every `<package>` element, in file order.
pub fn parse_registry(xml: &str) -> Vec<(String, PathBuf)> {
    xml.lines()
        .filter(|line| line.contains("<package name="))
        .filter_map(|line| {
            let name = REGISTRY_PACKAGE_NAME.captures(line)?.get(1)?.as_str();
            let code_path = REGISTRY_CODE_PATH.captures(line)?.get(1)?.as_str();
            Some((name.to_string(), PathBuf::from(code_path)))
        })
        .collect()
}

/// A code path ending in `.apk` is taken as is. A directory resolves to the
/// only `*.apk` directly inside it; none or several is ambiguous.
pub fn resolve_artifact(code_path: &Path) -> Option<PathBuf> {
    if code_path.extension().is_some_and(|e| e == "apk") {
        return Some(code_path.to_path_buf());
    }

    match apk_files_in_dir(code_path) {
        Ok(mut apks) if apks.len() == 1 => apks.pop(),
        Ok(apks) => {
            tracing::trace!("{} APKs under {:?}", apks.len(), code_path);
            None
        }
        Err(e) => {
            tracing::trace!("Cannot list {:?}: {e}", code_path);
            None
        }
    }
}

/// Reads the registry with root rights and resolves every entry.
pub fn build_catalog(shell: &dyn PrivilegedShell) -> Result<PackageCatalog> {
    let xml = shell
        .run(&["cat", PACKAGE_REGISTRY])
        .with_msg(format!("Reading package registry {PACKAGE_REGISTRY} failed"))?;
    let catalog = PackageCatalog::from_registry(&xml);
    tracing::info!("Catalog has {} packages", catalog.len());
    Ok(catalog)
}

pub fn list_installed(
    service: &dyn PackageService,
    category: PackageCategory,
) -> Result<Vec<String>> {
    let packages = service.list_packages(category)?;
    tracing::info!("Found {} {category} packages", packages.len());
    Ok(packages)
}
