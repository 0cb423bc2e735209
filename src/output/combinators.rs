// Copyright (c) 2025 - Cowboy AI, Inc.
//! Output combinators
//!
//! Joining several outputs into one. The joined output resolves once every
//! part resolves; it is unknown if any part is unknown and fails with the
//! first failure in argument order.

use futures::future::join_all;
use std::collections::BTreeSet;

use super::{Output, Resolved};

/// Join a list of outputs into one output of a list
///
/// # Example
///
/// ```rust
/// use hub_spoke_infrastructure::output::{all, Output};
///
/// # tokio_test::block_on(async {
/// let ids = all(vec![Output::known("subnet-1"), Output::known("subnet-2")]);
/// assert_eq!(ids.value().await.unwrap(), Some(vec!["subnet-1", "subnet-2"]));
/// # });
/// ```
pub fn all<T>(outputs: Vec<Output<T>>) -> Output<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Output::from_future(async move {
        let results = join_all(outputs.iter().map(|o| o.resolve())).await;

        let mut values = Vec::with_capacity(results.len());
        let mut dependencies = BTreeSet::new();
        let mut known = true;
        for result in results {
            let resolved = result?;
            dependencies.extend(resolved.dependencies);
            match resolved.value {
                Some(v) => values.push(v),
                None => known = false,
            }
        }

        Ok(Resolved {
            value: known.then_some(values),
            dependencies,
        })
    })
}

/// Join three outputs
pub fn zip3<A, B, C>(a: &Output<A>, b: &Output<B>, c: &Output<C>) -> Output<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    a.zip(b).zip(c).map(|((a, b), c)| (a, b, c))
}
