use crate::backup::device::{run_tool, InfoTool};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use getset::Getters;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Where `aapt` (or the `aopt` build shipped on some ROMs) usually lives.
pub static DEFAULT_TOOL_CANDIDATES: &[&str] = &[
    "/system/bin/aapt",
    "/system/bin/aopt",
    "/data/data/com.termux/files/usr/bin/aapt",
];

static PATH_TOOL_NAMES: &[&str] = &["aapt", "aopt"];

/// [`InfoTool`] backed by an `aapt`-compatible binary.
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct AaptInfoTool {
    path: PathBuf,
}

impl AaptInfoTool {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// First existing candidate, then `aapt`/`aopt` on `PATH`.
    pub fn discover<P: AsRef<Path>>(candidates: &[P]) -> Result<PathBuf> {
        if let Some(found) = candidates.iter().map(|p| p.as_ref()).find(|p| p.is_file()) {
            tracing::info!("Using info tool {:?}", found);
            return Ok(found.to_path_buf());
        }

        for name in PATH_TOOL_NAMES {
            if let Ok(found) = which::which(name) {
                tracing::info!("Using info tool {:?} from PATH", found);
                return Ok(found);
            }
        }

        Err(Error::ToolNotFound(
            candidates.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        ))
    }

    fn dump(&self, what: &str, apk: &Path, extra: Option<&str>) -> Result<String> {
        let mut args: Vec<&OsStr> = vec![OsStr::new("dump"), OsStr::new(what), apk.as_os_str()];
        args.extend(extra.map(OsStr::new));
        run_tool(&self.path, &args)
    }
}

impl InfoTool for AaptInfoTool {
    fn badging(&self, apk: &Path) -> Result<String> {
        self.dump("badging", apk, None)
            .with_debug_object_and_fn_name(apk.to_path_buf(), "badging")
    }

    fn manifest(&self, apk: &Path) -> Result<String> {
        self.dump("xmltree", apk, Some("AndroidManifest.xml"))
            .with_debug_object_and_fn_name(apk.to_path_buf(), "manifest")
    }
}
