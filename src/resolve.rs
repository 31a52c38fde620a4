//! Resolve module specifiers against an import map.

use std::iter::once;

use thiserror::Error;
use tracing::trace;
use url::Url;

use crate::{
    map::{ImportMap, SpecifierMap},
    util::url::{is_url_prefix, parse_specifier},
};

/// List of resolution errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No entry of the import map matches the specifier.
    #[error("unable to resolve specifier `{specifier}` from `{referrer}`")]
    Unresolved {
        /// Specifier to resolve.
        specifier: String,
        /// URL of the importing module.
        referrer: Url,
    },
    /// The import map forbids resolving the specifier.
    #[error("specifier `{specifier}` is blocked by the import map (imported from `{referrer}`)")]
    Blocked {
        /// Specifier to resolve.
        specifier: String,
        /// URL of the importing module.
        referrer: Url,
        /// Reason why the specifier is blocked.
        #[source]
        cause: BlockCause,
    },
}

impl ResolveError {
    /// Check if the error comes from a blocked specifier.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Reasons why a specifier is blocked.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BlockCause {
    /// The matching entry is `null`.
    #[error("the mapping is null")]
    Null,
    /// The matching entry is a prefix but its target is not.
    #[error("prefix `{key}` is mapped to `{target}`, which does not end with `/`")]
    NotPrefix {
        /// Matching key.
        key: String,
        /// Target of the key.
        target: Url,
    },
    /// The resolved target is not a valid URL.
    #[error("`{target}` is not a valid URL")]
    InvalidTarget {
        /// Resolved target.
        target: String,
    },
}

/// Entry of a specifier map matching a specifier.
enum Match<'a> {
    Exact(&'a Option<Url>),
    Prefix {
        key: &'a str,
        target: &'a Option<Url>,
    },
}

/// Resolve a specifier using an import map.
///
/// Scopes whose prefix matches `referrer` are searched first, most specific
/// first, then the top-level `imports`. In each mapping, an exact key wins
/// over the longest `/`-terminated key that prefixes the specifier. The
/// first mapping with a match decides the outcome, even if the match is
/// `null`.
///
/// This function does not perform any I/O.
pub fn resolve(map: &ImportMap, specifier: &str, referrer: &Url) -> Result<Url, ResolveError> {
    let mut scopes: Vec<(&String, &SpecifierMap)> = map
        .scopes()
        .iter()
        .filter(|(prefix, _)| is_url_prefix(prefix, referrer))
        .collect();

    scopes.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

    let found = scopes
        .into_iter()
        .map(|(_, specifier_map)| specifier_map)
        .chain(once(map.imports()))
        .find_map(|specifier_map| find_match(specifier_map, specifier));

    let blocked = |cause| ResolveError::Blocked {
        specifier: specifier.to_owned(),
        referrer: referrer.clone(),
        cause,
    };

    let url = match found {
        None => {
            return Err(ResolveError::Unresolved {
                specifier: specifier.to_owned(),
                referrer: referrer.clone(),
            });
        },
        Some(Match::Exact(None)) | Some(Match::Prefix { target: None, .. }) => {
            return Err(blocked(BlockCause::Null));
        },
        Some(Match::Exact(Some(target))) => target.clone(),
        Some(Match::Prefix {
            key,
            target: Some(target),
        }) => {
            if !target.as_str().ends_with('/') {
                return Err(blocked(BlockCause::NotPrefix {
                    key: key.to_owned(),
                    target: target.clone(),
                }));
            }
            let joined = format!("{}{}", target, &specifier[key.len()..]);
            Url::parse(&joined).map_err(|_| blocked(BlockCause::InvalidTarget { target: joined }))?
        },
    };

    trace!(specifier, %referrer, %url, "resolved specifier");

    Ok(url)
}

/// Resolve an import the way a module loader does.
///
/// Relative specifiers and URLs are first normalized against `referrer`,
/// then looked up with [`resolve`]. If the import map has no entry for it, a
/// specifier that is a URL resolves to itself.
pub fn resolve_import(
    map: &ImportMap,
    specifier: &str,
    referrer: &Url,
) -> Result<Url, ResolveError> {
    let url = parse_specifier(specifier, referrer);
    let key = url.as_ref().map_or(specifier, Url::as_str);

    match resolve(map, key, referrer) {
        Err(ResolveError::Unresolved { .. }) => url.ok_or_else(|| ResolveError::Unresolved {
            specifier: specifier.to_owned(),
            referrer: referrer.clone(),
        }),
        result => result,
    }
}

/// Find the entry of a specifier map that matches a specifier.
fn find_match<'a>(specifier_map: &'a SpecifierMap, specifier: &str) -> Option<Match<'a>> {
    if let Some(target) = specifier_map.get(specifier) {
        return Some(Match::Exact(target));
    }

    specifier_map
        .iter()
        .filter(|(key, _)| key.ends_with('/') && specifier.starts_with(key.as_str()))
        .max_by_key(|(key, _)| key.len())
        .map(|(key, target)| Match::Prefix {
            key: key.as_str(),
            target,
        })
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{BlockCause, ResolveError};
    use crate::map::{ImportMap, RawMapDocument};

    fn import_map(documents: &[&str]) -> ImportMap {
        let origin = Url::parse("https://site/").unwrap();
        documents.iter().fold(ImportMap::new(), |map, document| {
            map.compose(RawMapDocument::from_json(document).unwrap(), &origin)
        })
    }

    fn url(input: &str) -> Url {
        Url::parse(input).unwrap()
    }

    #[test]
    fn exact_and_prefix_matches() {
        let map = import_map(&[r#"{
            "imports": {
                "a/": "https://cdn/x/",
                "a/deep/": "https://cdn/deep/",
                "lib": "https://cdn/lib.js"
            }
        }"#]);
        let referrer = url("https://site/main.js");

        const CASES: [(&str, &str); 5] = [
            ("a/b.js", "https://cdn/x/b.js"),
            ("a/", "https://cdn/x/"),
            ("a/deep/c.js", "https://cdn/deep/c.js"),
            ("a/sub/d.js", "https://cdn/x/sub/d.js"),
            ("lib", "https://cdn/lib.js"),
        ];

        for (specifier, expected) in CASES {
            let result = super::resolve(&map, specifier, &referrer).map(String::from);
            assert_eq!(
                result.as_deref(),
                Ok(expected),
                "\nresolve({specifier:?}) expected {expected:?} but received {result:?}"
            );
        }
    }

    #[test]
    fn unresolved() {
        let map = import_map(&[r#"{ "imports": { "a/": "https://cdn/x/" } }"#]);
        let referrer = url("https://site/main.js");

        for specifier in ["ab.js", "a", "b/a/", "lodash"] {
            let result = super::resolve(&map, specifier, &referrer);
            assert_eq!(
                result,
                Err(ResolveError::Unresolved {
                    specifier: specifier.to_owned(),
                    referrer: referrer.clone(),
                }),
                "\nresolve({specifier:?}) must be unresolved"
            );
        }
    }

    #[test]
    fn scope_overrides_imports() {
        let map = import_map(&[r#"{
            "imports": { "lib": "https://cdn/top.js" },
            "scopes": {
                "https://site/app/": { "lib": "https://cdn/lib.js" }
            }
        }"#]);

        let result = super::resolve(&map, "lib", &url("https://site/app/x.js"));
        assert_eq!(result, Ok(url("https://cdn/lib.js")));

        let result = super::resolve(&map, "lib", &url("https://site/other/x.js"));
        assert_eq!(result, Ok(url("https://cdn/top.js")));
    }

    #[test]
    fn most_specific_scope_first() {
        let map = import_map(&[r#"{
            "imports": { "only-top": "https://cdn/top.js" },
            "scopes": {
                "https://site/": { "lib": "https://cdn/site.js", "shared": "https://cdn/shared.js" },
                "https://site/app/": { "lib": "https://cdn/app.js" },
                "https://site/app/admin/": { "lib": "https://cdn/admin.js" },
                "https://site/app/page.js": { "lib": "https://cdn/page.js" }
            }
        }"#]);

        const CASES: [(&str, &str, &str); 6] = [
            ("lib", "https://site/app/admin/x.js", "https://cdn/admin.js"),
            ("lib", "https://site/app/x.js", "https://cdn/app.js"),
            ("lib", "https://site/app/page.js", "https://cdn/page.js"),
            ("lib", "https://site/x.js", "https://cdn/site.js"),
            ("shared", "https://site/app/admin/x.js", "https://cdn/shared.js"),
            ("only-top", "https://site/app/admin/x.js", "https://cdn/top.js"),
        ];

        for (specifier, referrer, expected) in CASES {
            let result = super::resolve(&map, specifier, &url(referrer)).map(String::from);
            assert_eq!(
                result.as_deref(),
                Ok(expected),
                "\nresolve({specifier:?}, {referrer:?}) expected {expected:?} but received \
                 {result:?}"
            );
        }
    }

    #[test]
    fn first_matching_mapping_wins() {
        // The scope has a prefix match; the exact match of `imports` is ignored
        let map = import_map(&[r#"{
            "imports": { "pkg/main.js": "https://cdn/exact.js" },
            "scopes": {
                "https://site/app/": { "pkg/": "https://cdn/pkg/" }
            }
        }"#]);

        let result = super::resolve(&map, "pkg/main.js", &url("https://site/app/x.js"));
        assert_eq!(result, Ok(url("https://cdn/pkg/main.js")));
    }

    #[test]
    fn null_blocks_without_fallback() {
        let map = import_map(&[r#"{
            "imports": { "blocked": "https://cdn/blocked.js", "gone/": "https://cdn/gone/" },
            "scopes": {
                "https://site/app/": { "blocked": null, "gone/": null }
            }
        }"#]);
        let referrer = url("https://site/app/x.js");

        for specifier in ["blocked", "gone/x.js"] {
            let result = super::resolve(&map, specifier, &referrer);
            assert_eq!(
                result,
                Err(ResolveError::Blocked {
                    specifier: specifier.to_owned(),
                    referrer: referrer.clone(),
                    cause: BlockCause::Null,
                }),
                "\nresolve({specifier:?}) must be blocked"
            );
        }

        let result = super::resolve(&map, "blocked", &url("https://site/x.js"));
        assert_eq!(result, Ok(url("https://cdn/blocked.js")));
    }

    #[test]
    fn prefix_target_must_be_prefix() {
        let map = import_map(&[r#"{ "imports": { "a/": "https://cdn/x.js" } }"#]);

        let result = super::resolve(&map, "a/b.js", &url("https://site/main.js"));
        assert!(matches!(
            result,
            Err(ResolveError::Blocked {
                cause: BlockCause::NotPrefix { .. },
                ..
            })
        ));
        assert!(result.unwrap_err().is_blocked());

        // Exact matches are not affected
        let result = super::resolve(&map, "a/", &url("https://site/main.js"));
        assert_eq!(result, Ok(url("https://cdn/x.js")));
    }

    #[test]
    fn resolve_import() {
        let map = import_map(&[r#"{
            "imports": {
                "lib": "https://cdn/lib.js",
                "https://site/app/old.js": "https://site/app/new.js",
                "https://blocked/": null
            }
        }"#]);
        let referrer = url("https://site/app/main.js");

        const CASES: [(&str, &str); 5] = [
            ("lib", "https://cdn/lib.js"),
            ("./old.js", "https://site/app/new.js"),
            ("/app/old.js", "https://site/app/new.js"),
            ("./other.js", "https://site/app/other.js"),
            ("https://cdn/direct.js", "https://cdn/direct.js"),
        ];

        for (specifier, expected) in CASES {
            let result = super::resolve_import(&map, specifier, &referrer).map(String::from);
            assert_eq!(
                result.as_deref(),
                Ok(expected),
                "\nresolve_import({specifier:?}) expected {expected:?} but received {result:?}"
            );
        }

        let result = super::resolve_import(&map, "missing", &referrer);
        assert_eq!(
            result,
            Err(ResolveError::Unresolved {
                specifier: "missing".to_owned(),
                referrer: referrer.clone(),
            })
        );

        let result = super::resolve_import(&map, "https://blocked/x.js", &referrer);
        assert!(result.unwrap_err().is_blocked());
    }
}
