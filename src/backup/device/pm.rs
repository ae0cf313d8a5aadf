use crate::backup::catalog::PackageCategory;
use crate::backup::device::{run_tool, PackageService};
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use bon::Builder;
use std::path::PathBuf;

static PACKAGE_PREFIX: &str = "package:";

/// `pm list packages`, run locally on the device.
#[derive(Clone, Debug, Builder)]
pub struct PmPackageService {
    #[builder(default = PathBuf::from("pm"), into)]
    program: PathBuf,
}

impl Default for PmPackageService {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PackageService for PmPackageService {
    fn list_packages(&self, category: PackageCategory) -> Result<Vec<String>> {
        let mut args = vec!["list", "packages"];
        args.extend(category.pm_flag());

        run_tool(&self.program, &args)
            .map(|out| parse_package_list(&out))
            .with_msg(format!("Listing {category} packages failed"))
    }
}

/// Strips the `package:` tag from each line, keeping device order.
pub fn parse_package_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(PACKAGE_PREFIX))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
