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

//! Configuration types for connection pools.

use crate::pool::{AdmissionStrategy, UnboundedStrategy};
use std::sync::Arc;
use std::time::Duration;

/// Default time an idle connection stays reusable.
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_secs(30);

/// Configuration for a [`ConnectionPool`](crate::pool::ConnectionPool).
///
/// # Examples
///
/// ```rust
/// use rxnet::pool::{MaxConnectionsStrategy, PoolConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .with_max_idle_time(Duration::from_secs(10))
///     .with_idle_sweep_interval(Duration::from_secs(1))
///     .with_admission_strategy(Arc::new(MaxConnectionsStrategy::new(8)));
///
/// assert_eq!(config.admission_strategy.max_connections(), Some(8));
/// ```
#[derive(Clone)]
pub struct PoolConfig {
    /// How long a returned connection remains reusable.
    pub max_idle_time: Duration,

    /// Period of the background idle sweep. `None` disables the sweep; idle
    /// connections are then only checked when acquired.
    pub idle_sweep_interval: Option<Duration>,

    /// Policy deciding whether another connection may be opened.
    pub admission_strategy: Arc<dyn AdmissionStrategy>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
            idle_sweep_interval: None,
            admission_strategy: Arc::new(UnboundedStrategy),
        }
    }
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("max_idle_time", &self.max_idle_time)
            .field("idle_sweep_interval", &self.idle_sweep_interval)
            .field("admission_strategy", &self.admission_strategy.name())
            .finish()
    }
}

impl PoolConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long a returned connection remains reusable.
    pub fn with_max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    /// Enables the background idle sweep.
    pub fn with_idle_sweep_interval(mut self, interval: Duration) -> Self {
        self.idle_sweep_interval = Some(interval);
        self
    }

    /// Sets the admission strategy.
    pub fn with_admission_strategy(mut self, strategy: Arc<dyn AdmissionStrategy>) -> Self {
        self.admission_strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_idle_time, DEFAULT_MAX_IDLE_TIME);
        assert!(config.idle_sweep_interval.is_none());
        assert_eq!(config.admission_strategy.name(), "Unbounded");
    }

    #[test]
    fn test_debug_names_strategy() {
        let output = format!("{:?}", PoolConfig::default());
        assert!(output.contains("Unbounded"));
    }
}
