//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Admission strategies deciding whether a pool may open another connection.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Policy consulted by the pool before it creates a connection.
///
/// Strategies are shared between the pool and whoever configured it, so a
/// limit can be changed while the pool is in use. The pool calls
/// [`may_open`](Self::may_open) with its lock held; implementations must not
/// block.
///
/// # Examples
///
/// ```rust
/// use rxnet::pool::AdmissionStrategy;
///
/// #[derive(Debug)]
/// struct BusinessHours;
///
/// impl AdmissionStrategy for BusinessHours {
///     fn may_open(&self, open: usize) -> bool {
///         open < 4
///     }
///
///     fn max_connections(&self) -> Option<usize> {
///         Some(4)
///     }
///
///     fn name(&self) -> &str {
///         "BusinessHours"
///     }
/// }
/// ```
pub trait AdmissionStrategy: Send + Sync + std::fmt::Debug + 'static {
    /// Returns `true` if one more connection may be opened while `open`
    /// connections (idle, in use and being created) exist.
    fn may_open(&self, open: usize) -> bool;

    /// Current upper bound, `None` when unbounded.
    fn max_connections(&self) -> Option<usize>;

    /// Human-readable strategy name for logs.
    fn name(&self) -> &str;
}

/// Admits connections up to a limit that can be raised or replaced at runtime.
///
/// # Examples
///
/// ```rust
/// use rxnet::pool::{AdmissionStrategy, MaxConnectionsStrategy};
///
/// let strategy = MaxConnectionsStrategy::new(1);
/// assert!(strategy.may_open(0));
/// assert!(!strategy.may_open(1));
///
/// strategy.increment_max_connections(2);
/// assert_eq!(strategy.max_connections(), Some(3));
/// assert!(strategy.may_open(2));
/// ```
#[derive(Debug)]
pub struct MaxConnectionsStrategy {
    max: AtomicUsize,
}

impl MaxConnectionsStrategy {
    /// Creates a strategy admitting at most `max` connections.
    pub fn new(max: usize) -> Self {
        Self {
            max: AtomicUsize::new(max),
        }
    }

    /// Raises the limit by `by` and returns the new limit.
    pub fn increment_max_connections(&self, by: usize) -> usize {
        let previous = self
            .max
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |max| {
                Some(max.saturating_add(by))
            })
            .unwrap_or_else(|max| max);
        previous.saturating_add(by)
    }

    /// Replaces the limit. Existing connections above the new limit are kept;
    /// only new creations are refused.
    pub fn set_max_connections(&self, max: usize) {
        self.max.store(max, Ordering::SeqCst);
    }
}

impl AdmissionStrategy for MaxConnectionsStrategy {
    fn may_open(&self, open: usize) -> bool {
        open < self.max.load(Ordering::SeqCst)
    }

    fn max_connections(&self) -> Option<usize> {
        Some(self.max.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "MaxConnections"
    }
}

/// Admits every creation.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnboundedStrategy;

impl AdmissionStrategy for UnboundedStrategy {
    fn may_open(&self, _open: usize) -> bool {
        true
    }

    fn max_connections(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        "Unbounded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_max_connections_lowers_limit() {
        let strategy = MaxConnectionsStrategy::new(5);
        assert!(strategy.may_open(4));
        strategy.set_max_connections(2);
        assert!(!strategy.may_open(2));
        assert_eq!(strategy.max_connections(), Some(2));
    }

    #[test]
    fn test_increment_saturates() {
        let strategy = MaxConnectionsStrategy::new(usize::MAX - 1);
        assert_eq!(strategy.increment_max_connections(5), usize::MAX);
    }

    #[test]
    fn test_unbounded() {
        assert!(UnboundedStrategy.may_open(usize::MAX - 1));
        assert_eq!(UnboundedStrategy.max_connections(), None);
    }
}
