//! Pipeline configuration types.
//!
//! Configuration is built once per analysis run and passed by reference into
//! each stage; nothing here is mutated while tables are being processed.

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Column names used by the flattening and selection stages.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ColumnNames {
    /// Event (trigger) identifier.
    pub event_id: String,
    /// Plane (layer) index, a list per event before flattening.
    pub plane: String,
    /// Channel (pad) index, a list per event before flattening.
    pub channel: String,
    /// Hit amplitude in ADC counts, a list per event before flattening.
    pub amplitude: String,
    /// Derived per (event, plane) energy sum.
    pub plane_energy: String,
    /// Derived per event energy sum.
    pub shower_energy: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            event_id: "TLU_number".to_string(),
            plane: "planeID".to_string(),
            channel: "channelID".to_string(),
            amplitude: "amplitude".to_string(),
            plane_energy: "planeEnergy".to_string(),
            shower_energy: "showerEnergy".to_string(),
        }
    }
}

impl ColumnNames {
    /// The three per-hit columns, in (plane, channel, amplitude) order.
    #[must_use]
    pub fn hit_columns(&self) -> [&str; 3] {
        [&self.plane, &self.channel, &self.amplitude]
    }
}

/// Set of (plane, channel) pairs excluded from energy sums.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoisyChannels {
    pairs: BTreeSet<(i64, i64)>,
}

impl NoisyChannels {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the set from per-plane channel lists.
    pub fn from_planes<I, C>(planes: I) -> Self
    where
        I: IntoIterator<Item = (i64, C)>,
        C: IntoIterator<Item = i64>,
    {
        let mut set = Self::new();
        for (plane, channels) in planes {
            for channel in channels {
                set.insert(plane, channel);
            }
        }
        set
    }

    /// Marks a channel as noisy. Returns false if it was already marked.
    pub fn insert(&mut self, plane: i64, channel: i64) -> bool {
        self.pairs.insert((plane, channel))
    }

    /// Returns true if the channel is noisy.
    #[inline]
    #[must_use]
    pub fn contains(&self, plane: i64, channel: i64) -> bool {
        self.pairs.contains(&(plane, channel))
    }

    /// Returns the noisy channels of one plane, ascending.
    #[must_use]
    pub fn channels_in(&self, plane: i64) -> Vec<i64> {
        self.pairs
            .range((plane, i64::MIN)..=(plane, i64::MAX))
            .map(|&(_, channel)| channel)
            .collect()
    }

    /// Returns the number of noisy channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if no channel is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Configuration for hit flattening.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct FlattenConfig {
    /// Column names of the event table.
    pub columns: ColumnNames,
    /// Channels excluded from energy sums.
    pub noisy: NoisyChannels,
    /// Columns removed before expansion (absent names are ignored).
    pub drop_columns: Vec<String>,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            noisy: NoisyChannels::default(),
            drop_columns: vec!["toa".to_string()],
        }
    }
}

impl FlattenConfig {
    /// Creates a new flatten configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the column names.
    #[must_use]
    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    /// Sets the noisy channel set.
    #[must_use]
    pub fn with_noisy(mut self, noisy: NoisyChannels) -> Self {
        self.noisy = noisy;
        self
    }

    /// Sets the columns dropped before expansion.
    #[must_use]
    pub fn with_drop_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noisy_channels() {
        let noisy = NoisyChannels::from_planes([(0, vec![5, 3]), (2, vec![7])]);
        assert_eq!(noisy.len(), 3);
        assert!(noisy.contains(0, 3));
        assert!(noisy.contains(2, 7));
        assert!(!noisy.contains(1, 3));
        assert_eq!(noisy.channels_in(0), vec![3, 5]);
        assert!(noisy.channels_in(9).is_empty());
    }

    #[test]
    fn test_flatten_config() {
        let config = FlattenConfig::new()
            .with_noisy(NoisyChannels::from_planes([(1, vec![1])]))
            .with_drop_columns(["toa", "timestamp"]);

        assert_eq!(config.columns.event_id, "TLU_number");
        assert_eq!(config.drop_columns, vec!["toa", "timestamp"]);
        assert!(config.noisy.contains(1, 1));
        assert!(FlattenConfig::default().noisy.is_empty());
    }
}
