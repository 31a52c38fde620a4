//! Import map errors.

use std::convert::Infallible;

use thiserror::Error;

use crate::{config::ConfigError, discover::DiscoverError, loader::LoadError, resolve::ResolveError};

/// List of errors surfaced to importers.
///
/// `E` is the error type of the host module loader.
#[derive(Debug, Error)]
pub enum Error<E = Infallible> {
    /// Invalid configuration.
    #[error("failed to load configuration")]
    Config(#[source] ConfigError),
    /// Error while discovering import map declarations.
    #[error("failed to discover import maps")]
    Discover(#[source] DiscoverError),
    /// Error while loading import maps.
    #[error("failed to load import maps")]
    Load(#[source] LoadError),
    /// Error while resolving a module specifier.
    #[error("failed to resolve module specifier")]
    Resolve(#[source] ResolveError),
    /// Error while instantiating a module.
    #[error("failed to instantiate module")]
    Instantiate(#[source] E),
}

impl Error<Infallible> {
    /// Convert into an error of any host module loader.
    pub fn widen<E>(self) -> Error<E> {
        match self {
            Self::Config(error) => Error::Config(error),
            Self::Discover(error) => Error::Discover(error),
            Self::Load(error) => Error::Load(error),
            Self::Resolve(error) => Error::Resolve(error),
            Self::Instantiate(never) => match never {},
        }
    }
}
