// Copyright (c) 2025 - Cowboy AI, Inc.
//! Asynchronous Resource Attributes
//!
//! An `Output<T>` is a value that does not exist until the resource producing
//! it has been created. It has exactly one resolution point (a [`Resolver`])
//! and any number of consumers, each of which awaits the same shared result.
//!
//! ```text
//!  producer task                 consumers
//!  ─────────────                 ─────────
//!   Resolver<T> ──resolve()──▶  Output<T> ──▶ map / zip / all ──▶ inputs
//!                                   │
//!                                   └──────▶ continuation (declares more)
//! ```
//!
//! # Known, unknown, failed
//!
//! A resolved output carries either a known value or, during a preview of a
//! resource that does not exist yet, no value at all. Either way it carries
//! the URNs of the resources it was derived from so a consumer records the
//! right dependency edges. A failed producer resolves every consumer with the
//! same error.
//!
//! # Functor Laws
//!
//! ```text
//! output.map(|x| x)        == output
//! output.map(f).map(g)     == output.map(|x| g(f(x)))
//! ```
//!
//! # Example
//!
//! ```rust
//! use hub_spoke_infrastructure::output::Output;
//!
//! # tokio_test::block_on(async {
//! let cidr = Output::known("10.0.0.0/16".to_string());
//! let prefix = cidr.map(|c| c.split('/').nth(1).unwrap_or_default().to_string());
//! assert_eq!(prefix.value().await.unwrap(), Some("16".to_string()));
//! # });
//! ```

pub mod combinators;

pub use combinators::{all, zip3};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use tokio::sync::oneshot;

use crate::domain::Urn;
use crate::errors::{InfrastructureError, InfrastructureResult};

/// A resolved output: the value (if known) and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// `None` while the producing resource does not exist (preview)
    pub value: Option<T>,
    /// Resources this value was derived from
    pub dependencies: BTreeSet<Urn>,
}

impl<T> Resolved<T> {
    /// A known value with no dependencies
    pub fn known(value: T) -> Self {
        Self {
            value: Some(value),
            dependencies: BTreeSet::new(),
        }
    }

    /// An unknown value with no dependencies
    pub fn unknown() -> Self {
        Self {
            value: None,
            dependencies: BTreeSet::new(),
        }
    }

    /// Attach a producer
    pub fn from_resource(value: Option<T>, urn: Urn) -> Self {
        Self {
            value,
            dependencies: BTreeSet::from([urn]),
        }
    }

    /// Whether the value is known
    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }

    /// Transform the value, keeping the dependencies
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: self.value.map(f),
            dependencies: self.dependencies,
        }
    }
}

/// Result carried by an output
pub type OutputResult<T> = Result<Resolved<T>, InfrastructureError>;

/// Asynchronous attribute with a single resolution point
pub struct Output<T> {
    future: Shared<BoxFuture<'static, OutputResult<T>>>,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
        }
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Output<{}>", std::any::type_name::<T>())
    }
}

impl<T: Clone + Send + Sync + 'static> Output<T> {
    fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = OutputResult<T>> + Send + 'static,
    {
        Self {
            future: future.boxed().shared(),
        }
    }

    /// An already-known value
    pub fn known(value: T) -> Self {
        Self::from_result(Ok(Resolved::known(value)))
    }

    /// A value that will not be known during this run
    pub fn unknown() -> Self {
        Self::from_result(Ok(Resolved::unknown()))
    }

    /// An output that resolves with `err`
    pub fn failed(err: InfrastructureError) -> Self {
        Self::from_result(Err(err))
    }

    /// An output with a fixed result
    pub fn from_result(result: OutputResult<T>) -> Self {
        Self::from_future(futures::future::ready(result))
    }

    /// A pending output and its single resolution point
    ///
    /// Dropping the resolver without resolving cancels every consumer.
    pub fn pending() -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        let output = Self::from_future(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(InfrastructureError::Cancelled(
                    "producer dropped before resolving".to_string(),
                )),
            }
        });
        (Resolver { tx }, output)
    }

    /// Await the resolved output
    pub async fn resolve(&self) -> OutputResult<T> {
        self.future.clone().await
    }

    /// Await the value, discarding dependency information
    pub async fn value(&self) -> InfrastructureResult<Option<T>> {
        self.resolve().await.map(|r| r.value)
    }

    /// Transform the value once it resolves
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let future = self.future.clone();
        Output::from_future(async move { future.await.map(|r| r.map(f)) })
    }

    /// Transform the value with a fallible function
    pub fn try_map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> InfrastructureResult<U> + Send + 'static,
    {
        let future = self.future.clone();
        Output::from_future(async move {
            let resolved = future.await?;
            let value = match resolved.value {
                Some(v) => Some(f(v)?),
                None => None,
            };
            Ok(Resolved {
                value,
                dependencies: resolved.dependencies,
            })
        })
    }

    /// Combine two outputs; unknown if either is unknown
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.future.clone();
        let right = other.future.clone();
        Output::from_future(async move {
            let (a, b) = futures::join!(left, right);
            let (a, b) = (a?, b?);
            let mut dependencies = a.dependencies;
            dependencies.extend(b.dependencies);
            Ok(Resolved {
                value: a.value.zip(b.value),
                dependencies,
            })
        })
    }

    /// Record an extra producer on the resolved value
    pub fn with_dependency(&self, urn: Urn) -> Output<T> {
        let future = self.future.clone();
        Output::from_future(async move {
            let mut resolved = future.await?;
            resolved.dependencies.insert(urn);
            Ok(resolved)
        })
    }
}

impl<T: Serialize + Clone + Send + Sync + 'static> Output<T> {
    /// Erase the value type to JSON for use as a resource input
    pub fn to_json(&self) -> Output<serde_json::Value> {
        self.try_map(|v| Ok(serde_json::to_value(v)?))
    }
}

impl<T: Clone + Send + Sync + 'static> From<T> for Output<T> {
    fn from(value: T) -> Self {
        Output::known(value)
    }
}

impl From<&str> for Output<String> {
    fn from(value: &str) -> Self {
        Output::known(value.to_string())
    }
}

/// The single resolution point of an [`Output`]
pub struct Resolver<T> {
    tx: oneshot::Sender<OutputResult<T>>,
}

impl<T> Resolver<T> {
    /// Resolve every consumer with `resolved`
    pub fn resolve(self, resolved: Resolved<T>) {
        self.settle(Ok(resolved));
    }

    /// Fail every consumer with `err`
    pub fn reject(self, err: InfrastructureError) {
        self.settle(Err(err));
    }

    /// Resolve or fail every consumer
    pub fn settle(self, result: OutputResult<T>) {
        // No consumers left is not an error
        let _ = self.tx.send(result);
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolver<{}>", std::any::type_name::<T>())
    }
}
