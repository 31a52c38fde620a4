//! Warm up caches with module dependencies.
//!
//! Before a module is instantiated, the dependencies listed for it in the
//! `depcache` table are hinted to the environment, so that they are fetched
//! while the module itself is being processed.

use std::fmt;

use once_cell::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::map::ImportMap;

/// Mechanism used to hint a dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HintKind {
    /// Preload the dependency as a script.
    Preload,
    /// Prefetch the dependency.
    Prefetch,
    /// Request the dependency as an image, which fills the HTTP cache.
    Image,
}

/// A cache-warming hint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hint {
    /// URL of the dependency.
    pub url: Url,
    /// Mechanism used to warm up the cache.
    pub kind: HintKind,
}

/// Emit hints to the environment.
///
/// Probes returning an error are treated as unsupported.
pub trait HintSink: Send + Sync {
    /// Check if the environment supports preloading scripts.
    fn supports_preload(&self) -> anyhow::Result<bool>;

    /// Check if the environment supports prefetching.
    fn supports_prefetch(&self) -> anyhow::Result<bool>;

    /// Emit a hint without waiting for its outcome.
    fn emit(&self, hint: Hint) -> anyhow::Result<()>;
}

/// A [`HintSink`] that supports nothing and discards hints.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHints;

impl HintSink for NoHints {
    fn supports_preload(&self) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn supports_prefetch(&self) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn emit(&self, _hint: Hint) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emit hints for the dependencies of modules about to be instantiated.
pub struct PreloadTrigger {
    sink: Box<dyn HintSink>,
    kind: OnceCell<HintKind>,
}

impl fmt::Debug for PreloadTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadTrigger")
            .field("kind", &self.kind.get())
            .finish_non_exhaustive()
    }
}

impl PreloadTrigger {
    /// Create a trigger emitting hints to `sink`.
    pub fn new(sink: impl HintSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            kind: OnceCell::new(),
        }
    }

    /// Return the best mechanism supported by the sink.
    ///
    /// Detection runs once.
    pub fn kind(&self) -> HintKind {
        *self.kind.get_or_init(|| {
            let kind = if self.sink.supports_preload().unwrap_or(false) {
                HintKind::Preload
            } else if self.sink.supports_prefetch().unwrap_or(false) {
                HintKind::Prefetch
            } else {
                HintKind::Image
            };
            debug!(?kind, "detected hint capability");
            kind
        })
    }

    /// Hint the dependencies of `url` listed in the import map.
    ///
    /// Errors are logged and discarded. Returns the number of hints emitted.
    pub fn trigger(&self, map: &ImportMap, url: &Url) -> usize {
        let dependencies = map.dependencies(url);

        if dependencies.is_empty() {
            return 0;
        }

        let kind = self.kind();

        for dependency in dependencies {
            let hint = Hint {
                url: dependency.clone(),
                kind,
            };
            match self.sink.emit(hint) {
                Ok(()) => debug!(module = %url, %dependency, ?kind, "emitted hint"),
                Err(error) => debug!(module = %url, %dependency, %error, "failed to emit hint"),
            }
        }

        dependencies.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use anyhow::anyhow;
    use url::Url;

    use super::{Hint, HintKind, HintSink, NoHints, PreloadTrigger};
    use crate::map::{ImportMap, RawMapDocument};

    /// Record emitted hints.
    #[derive(Default)]
    struct Recorder {
        preload: Option<bool>,
        prefetch: Option<bool>,
        fail: bool,
        probes: Arc<AtomicUsize>,
        hints: Arc<Mutex<Vec<Hint>>>,
    }

    impl HintSink for Recorder {
        fn supports_preload(&self) -> anyhow::Result<bool> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.preload.ok_or_else(|| anyhow!("unknown rel"))
        }

        fn supports_prefetch(&self) -> anyhow::Result<bool> {
            self.prefetch.ok_or_else(|| anyhow!("unknown rel"))
        }

        fn emit(&self, hint: Hint) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow!("no document head"));
            }
            self.hints.lock().unwrap().push(hint);
            Ok(())
        }
    }

    fn import_map() -> ImportMap {
        ImportMap::new().compose(
            RawMapDocument::from_json(
                r#"{ "depcache": { "/app.js": ["/dep.js"], "/multi.js": ["/a.js", "/b.js"] } }"#,
            )
            .unwrap(),
            &Url::parse("https://site/").unwrap(),
        )
    }

    fn url(input: &str) -> Url {
        Url::parse(input).unwrap()
    }

    #[test]
    fn detect_kind() {
        const CASES: [(Option<bool>, Option<bool>, HintKind); 5] = [
            (Some(true), Some(true), HintKind::Preload),
            (Some(false), Some(true), HintKind::Prefetch),
            (None, Some(true), HintKind::Prefetch),
            (Some(false), Some(false), HintKind::Image),
            (None, None, HintKind::Image),
        ];

        for (preload, prefetch, expected) in CASES {
            let trigger = PreloadTrigger::new(Recorder {
                preload,
                prefetch,
                ..Default::default()
            });
            let result = trigger.kind();
            assert_eq!(
                result, expected,
                "\nkind() with preload {preload:?} and prefetch {prefetch:?} expected \
                 {expected:?} but received {result:?}"
            );
        }

        assert_eq!(PreloadTrigger::new(NoHints).kind(), HintKind::Image);
    }

    #[test]
    fn trigger_one_hint() {
        let hints = Arc::new(Mutex::new(Vec::new()));
        let trigger = PreloadTrigger::new(Recorder {
            preload: Some(true),
            hints: Arc::clone(&hints),
            ..Default::default()
        });

        let count = trigger.trigger(&import_map(), &url("https://site/app.js"));

        assert_eq!(count, 1);
        assert_eq!(*hints.lock().unwrap(), vec![Hint {
            url: url("https://site/dep.js"),
            kind: HintKind::Preload,
        }]);
    }

    #[test]
    fn trigger_in_order() {
        let hints = Arc::new(Mutex::new(Vec::new()));
        let trigger = PreloadTrigger::new(Recorder {
            hints: Arc::clone(&hints),
            ..Default::default()
        });

        let count = trigger.trigger(&import_map(), &url("https://site/multi.js"));

        assert_eq!(count, 2);
        assert_eq!(*hints.lock().unwrap(), vec![
            Hint {
                url: url("https://site/a.js"),
                kind: HintKind::Image,
            },
            Hint {
                url: url("https://site/b.js"),
                kind: HintKind::Image,
            },
        ]);
    }

    #[test]
    fn trigger_nothing() {
        let trigger = PreloadTrigger::new(Recorder::default());

        assert_eq!(trigger.trigger(&import_map(), &url("https://site/none.js")), 0);
        assert_eq!(trigger.trigger(&ImportMap::new(), &url("https://site/app.js")), 0);
    }

    #[test]
    fn failures_are_swallowed() {
        let trigger = PreloadTrigger::new(Recorder {
            fail: true,
            ..Default::default()
        });

        assert_eq!(trigger.trigger(&import_map(), &url("https://site/multi.js")), 2);
    }

    #[test]
    fn detect_once() {
        let probes = Arc::new(AtomicUsize::new(0));
        let trigger = PreloadTrigger::new(Recorder {
            preload: Some(true),
            probes: Arc::clone(&probes),
            ..Default::default()
        });

        trigger.trigger(&import_map(), &url("https://site/app.js"));
        trigger.trigger(&import_map(), &url("https://site/multi.js"));

        assert_eq!(trigger.kind(), HintKind::Preload);
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }
}
