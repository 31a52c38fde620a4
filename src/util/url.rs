//! Parse and resolve URLs and module specifiers.
//!
//! This module uses [`url`] under the hood.

use url::Url;

/// Check if a specifier is a relative URL (`/`, `./`, or `../`).
///
/// Backslashes are treated as forward slashes.
pub fn is_relative_specifier(specifier: impl AsRef<str>) -> bool {
    let specifier = specifier.as_ref().replace('\\', "/");
    matches!(specifier.as_str(), "." | "..")
        || specifier.starts_with('/')
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Resolve a relative specifier against a base URL.
///
/// Returns `None` if the specifier is bare (e.g. `lodash`) or already an
/// absolute URL, or if it cannot be joined to `base`.
pub fn resolve_if_not_plain_or_url(specifier: impl AsRef<str>, base: &Url) -> Option<Url> {
    let specifier = specifier.as_ref();
    if !is_relative_specifier(specifier) {
        return None;
    }
    base.join(&specifier.replace('\\', "/")).ok()
}

/// Parse a specifier as a URL.
///
/// Relative specifiers are resolved against `base`, absolute URLs are parsed
/// as is, and bare specifiers return `None`.
pub fn parse_specifier(specifier: impl AsRef<str>, base: &Url) -> Option<Url> {
    let specifier = specifier.as_ref();
    resolve_if_not_plain_or_url(specifier, base).or_else(|| Url::parse(specifier).ok())
}

/// Normalize a specifier so that it can be used as an import map key.
///
/// URL-like specifiers are serialized in their resolved form, bare
/// specifiers are kept verbatim.
pub fn normalize_specifier(specifier: impl AsRef<str>, base: &Url) -> String {
    let specifier = specifier.as_ref();
    parse_specifier(specifier, base)
        .map(String::from)
        .unwrap_or_else(|| specifier.to_owned())
}

/// Resolve any URL reference against a base URL.
///
/// Unlike [`parse_specifier`], bare references are resolved as paths, e.g.
/// `app/` becomes `./app/`.
pub fn resolve_url(input: impl AsRef<str>, base: &Url) -> Option<Url> {
    base.join(input.as_ref()).ok()
}

/// Check if `prefix` is a URL prefix of `url`.
///
/// A prefix either equals the URL or ends with `/` and starts it.
pub fn is_url_prefix(prefix: impl AsRef<str>, url: impl AsRef<str>) -> bool {
    let prefix = prefix.as_ref();
    let url = url.as_ref();
    prefix == url || (prefix.ends_with('/') && url.starts_with(prefix))
}
