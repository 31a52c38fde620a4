//! Discover import map declarations in HTML documents.
//!
//! This module uses [`lol_html`] under the hood.

use std::{borrow::Cow, cell::RefCell, rc::Rc};

use lol_html::{
    errors::{RewritingError, SelectorError},
    ElementContentHandlers, RewriteStrSettings, Selector,
};
use thiserror::Error;
use url::Url;

/// List of errors for this module.
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// The configured script types do not form a valid selector.
    #[error("invalid selector `{selector}`")]
    Selector {
        /// Selector built from the script types.
        selector: String,
        /// Source error.
        #[source]
        source: SelectorError,
    },
    /// LolHtml error.
    #[error(transparent)]
    LolHtmlRewriting(#[from] RewritingError),
}

/// A declared import map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MapSource {
    /// The document is embedded in the host document.
    Inline {
        /// JSON code of the document.
        text: String,
    },
    /// The document must be retrieved from a URL.
    External {
        /// URL of the document.
        url: Url,
    },
}

impl MapSource {
    /// Create an inline source.
    pub fn inline(text: impl Into<String>) -> Self {
        Self::Inline { text: text.into() }
    }

    /// Create an external source.
    pub fn external(url: Url) -> Self {
        Self::External { url }
    }

    /// Return the URL against which the document is resolved.
    pub fn origin<'a>(&'a self, base_url: &'a Url) -> &'a Url {
        match self {
            Self::Inline { .. } => base_url,
            Self::External { url } => url,
        }
    }
}

/// Extract import map declarations from HTML code, in document order.
///
/// Recognized elements are `<script>` elements whose `type` is one of
/// `map_types`. An element with a `src` attribute declares an external
/// document, resolved against `base_url`; otherwise its content is the
/// document.
pub fn discover_html(
    content: impl AsRef<str>,
    base_url: &Url,
    map_types: &[impl AsRef<str>],
) -> Result<Vec<MapSource>, DiscoverError> {
    const SRC: &str = "src";

    if map_types.is_empty() {
        return Ok(Vec::new());
    }

    let selector = map_types
        .iter()
        .map(|map_type| format!(r#"script[type="{}"]"#, map_type.as_ref()))
        .collect::<Vec<_>>()
        .join(",");

    let parsed: Selector = selector
        .parse()
        .map_err(|source| DiscoverError::Selector {
            selector: selector.clone(),
            source,
        })?;

    let sources = Rc::new(RefCell::new(Vec::<MapSource>::new()));

    let handlers = ElementContentHandlers::default()
        .element({
            let sources = Rc::clone(&sources);
            move |element| {
                let source = match element.get_attribute(SRC) {
                    Some(src) => MapSource::External {
                        url: base_url.join(&src)?,
                    },
                    None => MapSource::Inline {
                        text: String::new(),
                    },
                };
                sources.borrow_mut().push(source);
                Ok(())
            }
        })
        .text({
            let sources = Rc::clone(&sources);
            move |chunk| {
                // The content of external declarations is ignored
                if let Some(MapSource::Inline { text }) = sources.borrow_mut().last_mut() {
                    text.push_str(chunk.as_str());
                }
                Ok(())
            }
        });

    lol_html::rewrite_str(content.as_ref(), RewriteStrSettings {
        element_content_handlers: vec![(Cow::Owned(parsed), handlers)],
        ..Default::default()
    })?;

    Ok(sources.take())
}
