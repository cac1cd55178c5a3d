//! Pipeline configuration.

use crate::error::{Error, Result};

/// Default capacity of the item channel between producers and consumers.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Largest accepted item channel capacity. The channel allocates every slot
/// up front.
pub const MAX_CAPACITY: usize = 1 << 20;

/// How much production is allowed once the broken widget exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StopPolicy {
    /// Keep granting identifiers until a consumer's stop signal reaches the
    /// issuer. Widgets granted in the meantime are produced and consumed.
    #[default]
    InFlight,
    /// Never grant identifiers past the bad ordinal, so nothing is produced
    /// after the broken widget.
    Strict,
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Number of producer workers
    pub producers: usize,
    /// Number of consumer workers
    pub consumers: usize,
    /// Number of widgets to manufacture
    pub total_widgets: u64,
    /// Ordinal of the broken widget; outside `1..=total_widgets` means none
    pub bad_widget: i64,
    /// Maximum number of widgets buffered between producers and consumers
    pub capacity: usize,
    /// Production allowed after the broken widget
    pub stop_policy: StopPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            producers: 1,
            consumers: 1,
            total_widgets: 10,
            bad_widget: -1,
            capacity: DEFAULT_CAPACITY,
            stop_policy: StopPolicy::InFlight,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with the default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of producers
    pub fn producers(mut self, count: usize) -> Self {
        self.producers = count;
        self
    }

    /// Set the number of consumers
    pub fn consumers(mut self, count: usize) -> Self {
        self.consumers = count;
        self
    }

    /// Set the number of widgets to manufacture
    pub fn total_widgets(mut self, count: u64) -> Self {
        self.total_widgets = count;
        self
    }

    /// Set the ordinal of the broken widget
    pub fn bad_widget(mut self, ordinal: i64) -> Self {
        self.bad_widget = ordinal;
        self
    }

    /// Set the item channel capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the stop policy
    pub fn stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    /// Check the configuration before anything is spawned.
    pub fn validate(&self) -> Result<()> {
        if self.producers == 0 {
            return Err(Error::invalid("producer count must be positive"));
        }
        if self.consumers == 0 {
            return Err(Error::invalid("consumer count must be positive"));
        }
        if self.capacity == 0 {
            return Err(Error::invalid("item channel capacity must be positive"));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(Error::invalid(format!(
                "item channel capacity {} exceeds the maximum of {}",
                self.capacity, MAX_CAPACITY
            )));
        }
        Ok(())
    }

    /// The broken widget's identifier, if this run will ever produce one.
    pub fn bad_id(&self) -> Option<u64> {
        u64::try_from(self.bad_widget)
            .ok()
            .filter(|k| (1..=self.total_widgets).contains(k))
    }

    /// Number of identifiers the issuer may grant under the stop policy.
    pub fn grant_limit(&self) -> u64 {
        match (self.stop_policy, self.bad_id()) {
            (StopPolicy::Strict, Some(k)) => k,
            _ => self.total_widgets,
        }
    }
}
