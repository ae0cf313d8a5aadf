//! Name and version of an APK, read from `aapt dump badging` output.

use getset::Getters;
use lazy_regex::{lazy_regex, Lazy, Regex};

/// Placeholder used when an APK declares no `versionName`.
pub static UNKNOWN_VERSION: &str = "None";

static APPLICATION_LABEL: Lazy<Regex> = lazy_regex!(r"application-label:'(.*?)'");
static APPLICATION_LABEL_EN: Lazy<Regex> = lazy_regex!(r"application-label-en-(?:GB|US):'(.*?)'");
static APPLICATION_INLINE_LABEL: Lazy<Regex> = lazy_regex!(r"application: label='(.*?)'");
static PACKAGE_NAME: Lazy<Regex> = lazy_regex!(r"package: name='(.*?)'");
static VERSION_NAME: Lazy<Regex> = lazy_regex!(r"versionName='(.*?)'");

/// Label sources, most specific first. The package identifier the caller
/// already knows is the last resort after these.
static LABEL_TIERS: [&Lazy<Regex>; 4] = [
    &APPLICATION_LABEL,
    &APPLICATION_LABEL_EN,
    &APPLICATION_INLINE_LABEL,
    &PACKAGE_NAME,
];

/// Longest `{name}_{version}` stem put in a file name. Leaves room for a
/// `-N` counter and `.apk` under the 255 byte name limit.
pub const MAX_STEM_BYTES: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct PackageMetadata {
    displayed_name: String,
    normalized_name: String,
    version: String,
}

impl PackageMetadata {
    pub fn from_badging(identifier: &str, dump: &str) -> Self {
        let (displayed_name, normalized_name) = LABEL_TIERS
            .iter()
            .filter_map(|re| first_capture(re, dump))
            .find_map(|label| {
                let name = file_component(label);
                (!name.is_empty()).then(|| (label.to_string(), name))
            })
            .unwrap_or_else(|| (identifier.to_string(), file_component(identifier)));

        let version = first_capture(&VERSION_NAME, dump)
            .map(file_component)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

        Self {
            displayed_name,
            normalized_name,
            version,
        }
    }

    /// `{normalized_name}_{version}.apk`, with the stem cut to
    /// [`MAX_STEM_BYTES`].
    pub fn file_name(&self) -> String {
        let mut stem = format!("{}_{}", self.normalized_name, self.version);
        if stem.len() > MAX_STEM_BYTES {
            let cut = (0..=MAX_STEM_BYTES)
                .rev()
                .find(|&i| stem.is_char_boundary(i))
                .unwrap_or(0);
            stem.truncate(cut);
        }
        format!("{stem}.apk")
    }
}

fn first_capture<'a>(re: &Regex, dump: &'a str) -> Option<&'a str> {
    re.captures(dump)?.get(1).map(|m| m.as_str())
}

/// Normalized and stripped of anything not allowed in a file name.
fn file_component(s: &str) -> String {
    sanitize_filename::sanitize(normalize(s))
}

/// Removes whitespace and `/`.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '/')
        .collect()
}
