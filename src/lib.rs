//! Import map composition and module specifier resolution.
//!
//! Import maps are declared in a host document, either inline or as external
//! JSON documents. They are composed in document order into a single
//! [`ImportMap`], then used to resolve the specifiers imported by modules.
//!
//! [`ImportMapLoader`] wraps a host module loader: it waits for import maps
//! before the first resolution, and hints the dependencies of modules listed
//! in the `depcache` table before they are instantiated.

#![warn(missing_docs)]

pub mod config;
pub mod discover;
pub mod error;
pub mod fetch;
pub mod integration;
pub mod loader;
pub mod map;
pub mod preload;
pub mod resolve;
pub mod util;

pub use config::{Config, ConfigError};
pub use discover::{discover_html, MapSource};
pub use error::Error;
pub use fetch::{Fetch, FileFetch, MemoryFetch};
pub use integration::{HostLoader, ImportMapLoader};
pub use loader::{LoadError, MapLoader};
pub use map::{compose, ImportMap, RawMapDocument};
pub use preload::{Hint, HintKind, HintSink, NoHints, PreloadTrigger};
pub use resolve::{resolve, resolve_import, ResolveError};
pub use url::Url;
