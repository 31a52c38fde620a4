//! Retrieve external import map documents.

use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Context, Result};
use futures::future::{self, BoxFuture, FutureExt};
use url::Url;

/// Retrieve the text of a document from its URL.
///
/// Implementations must return a `'static` future so that retrievals can be
/// spawned ahead of composition.
pub trait Fetch: Send + Sync + 'static {
    /// Start retrieving the document located at `url`.
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<String>>;
}

impl<F> Fetch for Arc<F>
where
    F: Fetch + ?Sized,
{
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<String>> {
        (**self).fetch(url)
    }
}

/// Read documents from the local file system.
///
/// Only `file:` URLs are supported.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFetch;

impl Fetch for FileFetch {
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<String>> {
        let path = url
            .to_file_path()
            .map_err(|_| anyhow!("`{url}` is not a local file URL"));

        async move {
            let path = path?;
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading file {path:?}"))
        }
        .boxed()
    }
}

/// Serve documents from memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetch(HashMap<Url, String>);

impl MemoryFetch {
    /// Create an empty document table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document to the table.
    pub fn with(mut self, url: Url, text: impl Into<String>) -> Self {
        self.0.insert(url, text.into());
        self
    }

    /// Add a document to the table.
    pub fn insert(&mut self, url: Url, text: impl Into<String>) {
        self.0.insert(url, text.into());
    }
}

impl FromIterator<(Url, String)> for MemoryFetch {
    fn from_iter<T: IntoIterator<Item = (Url, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Fetch for MemoryFetch {
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<String>> {
        let result = self
            .0
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no document at `{url}`"));
        future::ready(result).boxed()
    }
}
