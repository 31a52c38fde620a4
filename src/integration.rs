//! Wrap a host module loader with import map support.
//!
//! [`ImportMapLoader`] implements the `resolve` and `instantiate` operations
//! of a module loader: every specifier goes through the composed import map,
//! and every instantiation is preceded by cache-warming hints before being
//! delegated to the host loader.

use std::{future::Future, sync::Arc};

use url::Url;

use crate::{
    config::Config,
    discover::{discover_html, MapSource},
    error::Error,
    fetch::Fetch,
    loader::{LoadError, MapLoader},
    map::ImportMap,
    preload::{HintSink, NoHints, PreloadTrigger},
    resolve::resolve_import,
};

/// The module loader being extended.
pub trait HostLoader: Send + Sync {
    /// Instantiated module.
    type Module: Send;

    /// Instantiation error.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Instantiate the module located at `url`.
    fn instantiate(
        &self,
        url: &Url,
        referrer: Option<&Url>,
    ) -> impl Future<Output = Result<Self::Module, Self::Error>> + Send;
}

/// A module loader resolving specifiers with import maps.
pub struct ImportMapLoader<H> {
    maps: MapLoader,
    preload: Option<PreloadTrigger>,
    host: H,
}

impl<H> ImportMapLoader<H>
where
    H: HostLoader,
{
    /// Create a loader for the given declarations, in document order.
    ///
    /// Fails if `config` does not pass [`Config::check`]. Hints are discarded
    /// until a sink is set with [`ImportMapLoader::with_hints`].
    pub fn new(
        config: &Config,
        sources: impl IntoIterator<Item = MapSource>,
        fetch: impl Fetch,
        host: H,
    ) -> Result<Self, Error<H::Error>> {
        config.check().map_err(Error::Config)?;

        Ok(Self {
            maps: MapLoader::new(config, sources, fetch),
            preload: config.preload.then(|| PreloadTrigger::new(NoHints)),
            host,
        })
    }

    /// Create a loader for the declarations found in an HTML document.
    pub fn from_html(
        config: &Config,
        html: impl AsRef<str>,
        fetch: impl Fetch,
        host: H,
    ) -> Result<Self, Error<H::Error>> {
        config.check().map_err(Error::Config)?;

        let sources = discover_html(html, &config.base_url, &config.map_types)
            .map_err(Error::Discover)?;

        Self::new(config, sources, fetch, host)
    }

    /// Emit cache-warming hints to `sink`.
    ///
    /// Has no effect if `config.preload` was unset.
    pub fn with_hints(self, sink: impl HintSink + 'static) -> Self {
        Self {
            preload: self.preload.map(|_| PreloadTrigger::new(sink)),
            ..self
        }
    }

    /// Return the host module loader.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Return the import map loader.
    pub fn maps(&self) -> &MapLoader {
        &self.maps
    }

    /// Wait until import maps are loaded.
    pub async fn prepare_import(&self) -> Result<Arc<ImportMap>, LoadError> {
        self.maps.ready().await
    }

    /// Resolve a specifier imported by `referrer`.
    ///
    /// Imports without referrer are resolved against the base URL.
    pub async fn resolve(&self, specifier: &str, referrer: Option<&Url>) -> Result<Url, Error> {
        let map = self.prepare_import().await.map_err(Error::Load)?;
        let referrer = referrer.unwrap_or_else(|| self.maps.base_url());
        resolve_import(&map, specifier, referrer).map_err(Error::Resolve)
    }

    /// Instantiate a resolved module with the host loader.
    ///
    /// The dependencies of the module are hinted first, if import maps are
    /// loaded. Hints never delay nor alter instantiation.
    pub async fn instantiate(
        &self,
        url: &Url,
        referrer: Option<&Url>,
    ) -> Result<H::Module, H::Error> {
        if let (Some(preload), Some(map)) = (&self.preload, self.maps.composed()) {
            preload.trigger(&map, url);
        }
        self.host.instantiate(url, referrer).await
    }

    /// Resolve and instantiate a module.
    pub async fn import(
        &self,
        specifier: &str,
        referrer: Option<&Url>,
    ) -> Result<H::Module, Error<H::Error>> {
        let url = self
            .resolve(specifier, referrer)
            .await
            .map_err(Error::widen)?;
        self.instantiate(&url, referrer)
            .await
            .map_err(Error::Instantiate)
    }
}
