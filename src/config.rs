//! Run configuration, fixed for the lifetime of a pipeline.

use serde::Serialize;

use crate::error::ConfigError;
use crate::timing::DelayRange;

/// Default label menu offered by producers.
pub const DEFAULT_MENU: [&str; 8] = [
    "burger",
    "fries",
    "cheeseburger",
    "chicken sandwich",
    "nuggets",
    "fish sandwich",
    "apple pie",
    "sundae",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineConfig {
    /// Maximum number of admitted, unclaimed items.
    pub capacity: usize,
    /// Number of identifiers issued before the run winds down.
    pub ceiling: u64,
    pub producers: usize,
    pub consumers: usize,
    /// Pause between item generations, per producer.
    pub arrival: DelayRange,
    /// Simulated service time, per claimed item.
    pub processing: DelayRange,
    pub labels: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            ceiling: 20,
            producers: 3,
            consumers: 4,
            arrival: DelayRange::millis(1_000, 5_000),
            processing: DelayRange::millis(5_000, 10_000),
            labels: DEFAULT_MENU.iter().map(|label| label.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_ceiling(mut self, ceiling: u64) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_producers(mut self, producers: usize) -> Self {
        self.producers = producers;
        self
    }

    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    pub fn with_arrival(mut self, arrival: DelayRange) -> Self {
        self.arrival = arrival;
        self
    }

    pub fn with_processing(mut self, processing: DelayRange) -> Self {
        self.processing = processing;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Check every knob before any thread is spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.ceiling == 0 {
            return Err(ConfigError::ZeroCeiling);
        }
        if self.producers == 0 {
            return Err(ConfigError::NoActors("producer"));
        }
        if self.consumers == 0 {
            return Err(ConfigError::NoActors("consumer"));
        }
        for (name, range) in [("arrival", &self.arrival), ("processing", &self.processing)] {
            if range.is_inverted() {
                return Err(ConfigError::InvertedRange {
                    name,
                    min_ms: range.min_ms,
                    max_ms: range.max_ms,
                });
            }
        }
        if self.labels.is_empty() {
            return Err(ConfigError::EmptyMenu);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_scenario() {
        let config = PipelineConfig::default();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.ceiling, 20);
        assert_eq!(config.producers, 3);
        assert_eq!(config.consumers, 4);
        assert_eq!(config.labels.len(), DEFAULT_MENU.len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_settings() {
        let base = PipelineConfig::default();
        assert_eq!(
            base.clone().with_capacity(0).validate(),
            Err(ConfigError::ZeroCapacity)
        );
        assert_eq!(
            base.clone().with_ceiling(0).validate(),
            Err(ConfigError::ZeroCeiling)
        );
        assert_eq!(
            base.clone().with_consumers(0).validate(),
            Err(ConfigError::NoActors("consumer"))
        );
        assert_eq!(
            base.clone()
                .with_labels(Vec::<String>::new())
                .validate(),
            Err(ConfigError::EmptyMenu)
        );
    }

    #[test]
    fn rejects_inverted_range() {
        let config = PipelineConfig::default().with_processing(DelayRange::millis(9, 3));
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                name: "processing",
                min_ms: 9,
                max_ms: 3,
            })
        );
    }
}
