//! Theme package exclusion.
//!
//! Every filter returns a new list and leaves its input untouched.

use crate::backup::catalog::{PackageCatalog, PackageCategory};
use crate::backup::device::{InfoTool, PackageService};
use crate::backup::result_error::result::Result;
use crate::backup::state::BackupState;
use bon::Builder;

/// Manifest attribute present in overlays built by the Substratum engine.
pub static OVERLAY_MARKER: &str = "Substratum_Parent";
/// System package that ships the Substratum overlay backend.
pub static OVERLAY_ENGINE_PACKAGE: &str = "masquerade.substratum";
/// Identifier fragment of theme variants compiled by Arcus.
pub static VARIANT_MARKER: &str = "pixkart.arcus.user";
/// The Arcus theme compiler app.
pub static VARIANT_ENGINE_PACKAGE: &str = "com.pixkart.arcus";

#[derive(Clone, Copy, Debug, Default, Builder, PartialEq, Eq)]
pub struct FilterOptions {
    #[builder(default)]
    pub keep_overlays: bool,
    #[builder(default)]
    pub keep_variants: bool,
}

/// Drops every identifier whose manifest carries [`OVERLAY_MARKER`].
/// Packages that cannot be inspected are kept.
pub fn exclude_overlays(
    info_tool: &dyn InfoTool,
    catalog: &PackageCatalog,
    identifiers: &[String],
) -> Vec<String> {
    identifiers
        .iter()
        .filter(|id| {
            let Some(apk) = catalog.path_of(id) else {
                return true;
            };
            match info_tool.manifest(apk) {
                Ok(manifest) => {
                    let overlay = manifest.contains(OVERLAY_MARKER);
                    if overlay {
                        tracing::debug!("Excluding overlay {id}");
                    }
                    !overlay
                }
                Err(e) => {
                    tracing::warn!("Cannot inspect manifest of {id}, keeping it: {e}");
                    true
                }
            }
        })
        .cloned()
        .collect()
}

pub fn exclude_variants(identifiers: &[String]) -> Vec<String> {
    identifiers
        .iter()
        .filter(|id| !id.contains(VARIANT_MARKER))
        .cloned()
        .collect()
}

/// Queried once, then remembered in the state.
pub fn overlay_engine_present(
    state: &mut BackupState,
    service: &dyn PackageService,
) -> Result<bool> {
    if let Some(present) = state.overlay_engine {
        return Ok(present);
    }
    let present = service.is_installed(PackageCategory::System, OVERLAY_ENGINE_PACKAGE)?;
    tracing::info!("Overlay engine installed: {present}");
    state.overlay_engine = Some(present);
    Ok(present)
}

/// Queried once, then remembered in the state.
pub fn variant_engine_present(
    state: &mut BackupState,
    service: &dyn PackageService,
) -> Result<bool> {
    if let Some(present) = state.variant_engine {
        return Ok(present);
    }
    let present = service.is_installed(PackageCategory::User, VARIANT_ENGINE_PACKAGE)?;
    tracing::info!("Variant engine installed: {present}");
    state.variant_engine = Some(present);
    Ok(present)
}

/// Runs the requested filters. Detection only happens for filters that
/// were not opted out of, and a filter is skipped when its engine is absent.
pub fn apply_filters(
    state: &mut BackupState,
    service: &dyn PackageService,
    info_tool: &dyn InfoTool,
    catalog: &PackageCatalog,
    identifiers: Vec<String>,
    options: FilterOptions,
) -> Result<Vec<String>> {
    let mut identifiers = identifiers;

    if !options.keep_overlays && overlay_engine_present(state, service)? {
        let before = identifiers.len();
        identifiers = exclude_overlays(info_tool, catalog, &identifiers);
        tracing::info!("Excluded {} overlays", before - identifiers.len());
    }

    if !options.keep_variants && variant_engine_present(state, service)? {
        let before = identifiers.len();
        identifiers = exclude_variants(&identifiers);
        tracing::info!("Excluded {} theme variants", before - identifiers.len());
    }

    Ok(identifiers)
}
