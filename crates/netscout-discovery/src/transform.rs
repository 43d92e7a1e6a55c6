//! Per-record transforms and filters applied by resolvers

use crate::error::{BoxError, DiscoveryError, Result};
use std::fmt;
use std::sync::Arc;

type TransformFn<R, T> = dyn Fn(R) -> std::result::Result<T, BoxError> + Send + Sync;
type FilterFn<R> = dyn Fn(&R) -> bool + Send + Sync;

/// Maps a raw protocol record to an application-defined result.
///
/// A transform is applied sequentially by a resolver's relay task, once per
/// record, before the result reaches the caller's channel. An error aborts
/// the whole discovery call.
pub struct Transform<R, T> {
    f: Arc<TransformFn<R, T>>,
}

impl<R, T> Transform<R, T> {
    /// Creates a transform from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(R) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Applies the transform to one raw record.
    pub fn apply(&self, raw: R) -> Result<T> {
        (self.f)(raw).map_err(DiscoveryError::Transform)
    }
}

impl<R: 'static> Transform<R, R> {
    /// The transform that forwards raw records unchanged.
    pub fn identity() -> Self {
        Self::new(Ok)
    }
}

impl<R, T> Clone for Transform<R, T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<R, T> fmt::Debug for Transform<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").finish_non_exhaustive()
    }
}

/// Predicate deciding which raw records a resolver forwards.
pub struct Filter<R> {
    f: Option<Arc<FilterFn<R>>>,
}

impl<R> Filter<R> {
    /// Creates a filter from a predicate.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        Self { f: Some(Arc::new(f)) }
    }

    /// A filter that keeps every record.
    pub fn accept_all() -> Self {
        Self { f: None }
    }

    /// Returns true if the record should be forwarded.
    pub fn matches(&self, record: &R) -> bool {
        self.f.as_ref().map_or(true, |f| f(record))
    }
}

impl<R> Default for Filter<R> {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl<R> Clone for Filter<R> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<R> fmt::Debug for Filter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("accept_all", &self.f.is_none())
            .finish()
    }
}
