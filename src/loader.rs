//! Load and compose declared import maps.
//!
//! Declared documents are retrieved concurrently but folded strictly in
//! document order: the merge of a document starts only once the previous one
//! has been merged, whatever the order in which retrievals complete.
//!
//! Composition starts on the first call to [`MapLoader::ready`] and runs in
//! its own task, so that it completes even if that caller goes away.

use std::{
    error::Error as StdError,
    sync::{Arc, Mutex, PoisonError},
};

use futures::{
    future::{self, BoxFuture, FutureExt, Shared},
    stream::{FuturesOrdered, StreamExt},
};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::debug;
use url::Url;

use crate::{
    config::Config,
    discover::MapSource,
    fetch::Fetch,
    map::{ImportMap, RawMapDocument},
};

/// A shareable error source.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// List of errors while loading import maps.
///
/// Errors are cheap to clone so that every caller of [`MapLoader::ready`]
/// receives the same outcome.
#[derive(Clone, Debug, Error)]
pub enum LoadError {
    /// Error while retrieving an external document.
    #[error("failed to fetch import map #{index} from `{url}`")]
    Fetch {
        /// Position of the declaration in document order.
        index: usize,
        /// URL of the document.
        url: Url,
        /// Source error.
        #[source]
        source: SharedError,
    },
    /// Error while parsing a document.
    #[error("failed to parse import map #{index} (resolved against `{origin}`)")]
    Parse {
        /// Position of the declaration in document order.
        index: usize,
        /// URL against which the document is resolved.
        origin: Url,
        /// Source error.
        #[source]
        source: SharedError,
    },
    /// The retrieval task of a document was aborted.
    #[error("failed to fetch import map #{index} from `{url}`: retrieval task aborted")]
    Join {
        /// Position of the declaration in document order.
        index: usize,
        /// URL of the document.
        url: Url,
        /// Source error.
        #[source]
        source: SharedError,
    },
    /// The composition task was aborted.
    #[error("failed to compose import maps: composition task aborted")]
    Aborted {
        /// Source error.
        #[source]
        source: SharedError,
    },
}

/// Retrieval of a document, started ahead of composition.
type Prefetch = JoinHandle<anyhow::Result<String>>;

/// A retrieved and parsed document with its origin.
type Retrieved = (Url, RawMapDocument);

/// Outcome of the composition, shared by every caller.
type Composition = Shared<BoxFuture<'static, Result<Arc<ImportMap>, LoadError>>>;

/// Load declared import maps and compose them once.
pub struct MapLoader {
    base_url: Url,
    sources: Vec<MapSource>,
    fetch: Arc<dyn Fetch>,
    prefetched: Mutex<Vec<Option<Prefetch>>>,
    composition: OnceCell<Composition>,
}

impl MapLoader {
    /// Create a loader for the given declarations, in document order.
    ///
    /// `config` is expected to have passed [`Config::check`]. If
    /// `config.prefetch` is set and a Tokio runtime is running, retrieval of
    /// external documents starts immediately.
    pub fn new(
        config: &Config,
        sources: impl IntoIterator<Item = MapSource>,
        fetch: impl Fetch,
    ) -> Self {
        let sources: Vec<MapSource> = sources.into_iter().collect();
        let fetch: Arc<dyn Fetch> = Arc::new(fetch);

        let runtime = config.prefetch.then(Handle::try_current).and_then(Result::ok);

        let prefetched = sources
            .iter()
            .map(|source| match (source, &runtime) {
                (MapSource::External { url }, Some(runtime)) => {
                    debug!(%url, "prefetching import map");
                    Some(runtime.spawn(fetch.fetch(url)))
                },
                _ => None,
            })
            .collect();

        Self {
            base_url: config.base_url.clone(),
            sources,
            fetch,
            prefetched: Mutex::new(prefetched),
            composition: OnceCell::new(),
        }
    }

    /// Return the base URL of the host document.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Return the declarations, in document order.
    pub fn sources(&self) -> &[MapSource] {
        &self.sources
    }

    /// Wait until all declarations are composed.
    ///
    /// The first call starts the work; every other call, concurrent or
    /// later, receives the same outcome. Dropping a caller does not cancel
    /// the composition.
    pub async fn ready(&self) -> Result<Arc<ImportMap>, LoadError> {
        self.composition.get_or_init(|| self.start()).clone().await
    }

    /// Return the composed import map if [`MapLoader::ready`] has succeeded.
    pub fn composed(&self) -> Option<Arc<ImportMap>> {
        self.composition
            .get()
            .and_then(Shared::peek)
            .and_then(|result| result.as_ref().ok())
            .cloned()
    }

    /// Start composing, in a task of its own if a Tokio runtime is running.
    fn start(&self) -> Composition {
        let retrievals: FuturesOrdered<_> = self
            .sources
            .iter()
            .enumerate()
            .map(|(index, source)| self.retrieve(index, source))
            .collect();

        let composition = compose_all(retrievals);

        match Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(composition);
                async move {
                    task.await.unwrap_or_else(|error| {
                        Err(LoadError::Aborted {
                            source: Arc::new(error),
                        })
                    })
                }
                .boxed()
                .shared()
            },
            Err(_) => composition.boxed().shared(),
        }
    }

    /// Retrieve and parse one declaration.
    fn retrieve(
        &self,
        index: usize,
        source: &MapSource,
    ) -> BoxFuture<'static, Result<Retrieved, LoadError>> {
        let origin = source.origin(&self.base_url).clone();

        match source {
            MapSource::Inline { text } => future::ready(parse(index, text, origin)).boxed(),
            MapSource::External { .. } => {
                let prefetched = self.take_prefetched(index);
                let fetch = Arc::clone(&self.fetch);

                async move {
                    let text = match prefetched {
                        Some(handle) => handle.await.map_err(|error| LoadError::Join {
                            index,
                            url: origin.clone(),
                            source: Arc::new(error),
                        })?,
                        None => fetch.fetch(&origin).await,
                    }
                    .map_err(|error| LoadError::Fetch {
                        index,
                        url: origin.clone(),
                        source: share(error),
                    })?;

                    parse(index, &text, origin)
                }
                .boxed()
            },
        }
    }

    fn take_prefetched(&self, index: usize) -> Option<Prefetch> {
        self.prefetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(index)
            .and_then(Option::take)
    }
}

/// Fold retrieved documents in document order.
async fn compose_all(
    mut retrievals: FuturesOrdered<BoxFuture<'static, Result<Retrieved, LoadError>>>,
) -> Result<Arc<ImportMap>, LoadError> {
    let mut map = ImportMap::new();

    while let Some(retrieved) = retrievals.next().await {
        let (origin, document) = retrieved?;
        map = map.compose(document, &origin);
        debug!(%origin, "merged import map");
    }

    Ok(Arc::new(map))
}

/// Parse a document resolved against `origin`.
fn parse(index: usize, text: &str, origin: Url) -> Result<Retrieved, LoadError> {
    match RawMapDocument::from_json(text) {
        Ok(document) => Ok((origin, document)),
        Err(error) => Err(LoadError::Parse {
            index,
            origin,
            source: Arc::new(error),
        }),
    }
}

fn share(error: anyhow::Error) -> SharedError {
    Arc::from(Box::<dyn StdError + Send + Sync>::from(error))
}
