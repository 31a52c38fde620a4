//! Compose import maps.
//!
//! An import map document is declared as JSON:
//!
//! ```json
//! {
//!   "imports": { "lodash": "https://cdn.com/lodash.js" },
//!   "scopes": { "/app/": { "lodash": "/vendor/lodash.js" } },
//!   "depcache": { "/app/main.js": ["/app/dep.js"] }
//! }
//! ```
//!
//! Documents are folded one after the other into an [`ImportMap`]. Entries of
//! later documents override entries of earlier ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::util::url::{normalize_specifier, resolve_url};

/// Mapping from specifiers to target URLs.
///
/// A target of `None` blocks the specifier.
pub type SpecifierMap = BTreeMap<String, Option<Url>>;

/// A composed import map.
///
/// All targets, scope prefixes, and depcache entries are absolute URLs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportMap {
    imports: SpecifierMap,
    scopes: BTreeMap<String, SpecifierMap>,
    depcache: BTreeMap<String, Vec<Url>>,
}

/// An import map document, as declared.
///
/// Values are kept as raw JSON until they are resolved by
/// [`ImportMap::compose`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawMapDocument {
    /// Unscoped specifier mappings.
    pub imports: BTreeMap<String, serde_json::Value>,

    /// Specifier mappings keyed by scope prefix.
    pub scopes: BTreeMap<String, BTreeMap<String, serde_json::Value>>,

    /// Dependencies to warm up, keyed by module URL.
    pub depcache: BTreeMap<String, Vec<serde_json::Value>>,
}

impl RawMapDocument {
    /// Parse an import map document from JSON code.
    pub fn from_json(input: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input.as_ref())
    }
}

impl ImportMap {
    /// Create an empty import map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the unscoped specifier mappings.
    pub fn imports(&self) -> &SpecifierMap {
        &self.imports
    }

    /// Return the specifier mappings keyed by scope prefix.
    pub fn scopes(&self) -> &BTreeMap<String, SpecifierMap> {
        &self.scopes
    }

    /// Return the dependency table.
    pub fn depcache(&self) -> &BTreeMap<String, Vec<Url>> {
        &self.depcache
    }

    /// Return the dependencies to warm up before instantiating `url`.
    pub fn dependencies(&self, url: &Url) -> &[Url] {
        self.depcache
            .get(url.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Check if the import map has no entry at all.
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.scopes.is_empty() && self.depcache.is_empty()
    }

    /// Fold a document into the import map.
    ///
    /// Relative URLs of `incoming` are resolved against `origin`, which is
    /// the URL of the document if external, or the base URL of the host
    /// document if inline. Targets that are not valid URLs become `None`.
    pub fn compose(mut self, incoming: RawMapDocument, origin: &Url) -> Self {
        let RawMapDocument {
            imports,
            scopes,
            depcache,
        } = incoming;

        compose_specifier_map(&mut self.imports, imports, origin);

        for (prefix, specifier_map) in scopes {
            let Some(prefix_url) = resolve_url(&prefix, origin) else {
                warn!(%origin, scope = %prefix, "ignoring scope with an invalid URL");
                continue;
            };
            let scope = self.scopes.entry(prefix_url.into()).or_default();
            compose_specifier_map(scope, specifier_map, origin);
        }

        for (module, dependencies) in depcache {
            let Some(module_url) = resolve_url(&module, origin) else {
                warn!(%origin, module = %module, "ignoring depcache entry with an invalid URL");
                continue;
            };
            let dependencies = dependencies
                .into_iter()
                .filter_map(|dependency| {
                    let url = dependency
                        .as_str()
                        .and_then(|dependency| resolve_url(dependency, origin));
                    if url.is_none() {
                        warn!(%origin, module = %module, %dependency, "ignoring invalid dependency");
                    }
                    url
                })
                .collect();
            self.depcache.insert(module_url.into(), dependencies);
        }

        self
    }
}

/// Fold a document into an import map.
///
/// See [`ImportMap::compose`].
pub fn compose(base: ImportMap, incoming: RawMapDocument, origin: &Url) -> ImportMap {
    base.compose(incoming, origin)
}

/// Merge raw specifier mappings into `out`, overwriting existing keys.
fn compose_specifier_map(
    out: &mut SpecifierMap,
    incoming: BTreeMap<String, serde_json::Value>,
    origin: &Url,
) {
    for (specifier, target) in incoming {
        let key = normalize_specifier(&specifier, origin);
        let target = match target {
            serde_json::Value::Null => None,
            serde_json::Value::String(target) => {
                let url = resolve_url(&target, origin);
                if url.is_none() {
                    warn!(%origin, %specifier, %target, "blocking specifier with an invalid target");
                }
                url
            },
            target => {
                warn!(%origin, %specifier, %target, "blocking specifier with a non-string target");
                None
            },
        };
        out.insert(key, target);
    }
}
