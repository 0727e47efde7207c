//! Data source identification.
//!
//! A `DataSource` names the wire format a message arrived in. The set of
//! sources is a fixed, ordered table.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Names of all supported sources, in table order.
const SOURCE_NAMES: [&str; 3] = ["generic", "collectd", "ceilometer"];

/// Supported wire formats of incoming messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataSource {
    /// Arbitrary JSON documents.
    #[default]
    Generic,
    /// collectd alert notifications.
    Collectd,
    /// Ceilometer events wrapped in an oslo messaging envelope.
    Ceilometer,
}

/// Returned when a name does not match any registered source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown data source: '{0}'")]
pub struct UnknownDataSource(pub String);

impl DataSource {
    /// Number of registered sources.
    pub const COUNT: usize = SOURCE_NAMES.len();

    /// Every source, in table order.
    pub const ALL: [DataSource; Self::COUNT] = [Self::Generic, Self::Collectd, Self::Ceilometer];

    /// Returns the human readable names of all sources.
    #[must_use]
    pub fn list_all() -> &'static [&'static str] {
        &SOURCE_NAMES
    }

    /// Position of this source in the table.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the human readable name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        SOURCE_NAMES[self.index()]
    }

    /// Resets `self` from a human readable name.
    ///
    /// Returns `false` and leaves `self` untouched when the name is unknown.
    pub fn set_from_str(&mut self, name: &str) -> bool {
        match name.parse() {
            Ok(source) => {
                *self = source;
                true
            }
            Err(_) => false,
        }
    }

    /// Returns the namespacing pattern (`"<name>_*"`) used for bulk operations
    /// such as index deletion.
    #[must_use]
    pub fn prefix(self) -> String {
        format!("{}_*", self.as_str())
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = UnknownDataSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| UnknownDataSource(s.to_string()))
    }
}

impl TryFrom<String> for DataSource {
    type Error = UnknownDataSource;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataSource> for String {
    fn from(source: DataSource) -> Self {
        source.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_for_every_registered_name() {
        for name in DataSource::list_all() {
            let source: DataSource = name.parse().unwrap();
            assert_eq!(source.to_string(), *name);
        }
    }

    #[test]
    fn test_table_order_matches_variants() {
        for (i, source) in DataSource::ALL.iter().enumerate() {
            assert_eq!(source.index(), i);
        }
    }

    #[test]
    fn test_unknown_name_leaves_target_unchanged() {
        let mut source = DataSource::Ceilometer;
        assert!(!source.set_from_str("syslog"));
        assert_eq!(source, DataSource::Ceilometer);

        assert!(source.set_from_str("collectd"));
        assert_eq!(source, DataSource::Collectd);
    }

    #[test]
    fn test_from_str_unknown() {
        let result = "COLLECTD".parse::<DataSource>();
        assert_eq!(result, Err(UnknownDataSource("COLLECTD".to_string())));
    }

    #[test]
    fn test_prefix() {
        assert_eq!(DataSource::Generic.prefix(), "generic_*");
        assert_eq!(DataSource::Collectd.prefix(), "collectd_*");
        assert_eq!(DataSource::Ceilometer.prefix(), "ceilometer_*");
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&DataSource::Collectd).unwrap();
        assert_eq!(json, "\"collectd\"");

        let parsed: DataSource = serde_json::from_str("\"ceilometer\"").unwrap();
        assert_eq!(parsed, DataSource::Ceilometer);

        assert!(serde_json::from_str::<DataSource>("\"nagios\"").is_err());
    }
}
