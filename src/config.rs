//! Store configuration.

use serde::Deserialize;

/// How an empty-string value read from a mechanism is represented in the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyValuePolicy {
    /// `""` is a real value and is reported as `Some("")`.
    #[default]
    Preserve,
    /// `""` is reported as known-absent, the same as a missing entry.
    TreatAsAbsent,
}

/// Construction-time options shared by every keyed store.
///
/// # Examples
///
/// ```
/// use keysync::{EmptyValuePolicy, StoreConfig};
///
/// let config = StoreConfig::local().with_empty_values(EmptyValuePolicy::TreatAsAbsent);
/// assert_eq!(config.label, "localStorage");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name attached to every log record the store emits.
    pub label: String,
    pub empty_values: EmptyValuePolicy,
}

impl StoreConfig {
    pub fn cookies() -> Self {
        Self::default().with_label("cookies")
    }

    pub fn local() -> Self {
        Self::default().with_label("localStorage")
    }

    pub fn session() -> Self {
        Self::default().with_label("sessionStorage")
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_empty_values(mut self, policy: EmptyValuePolicy) -> Self {
        self.empty_values = policy;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: "store".to_string(),
            empty_values: EmptyValuePolicy::Preserve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_json_fills_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{ "empty_values": "treat_as_absent" }"#).unwrap();

        assert_eq!(config.label, "store");
        assert_eq!(config.empty_values, EmptyValuePolicy::TreatAsAbsent);
    }

    #[test]
    fn named_constructors() {
        assert_eq!(StoreConfig::cookies().label, "cookies");
        assert_eq!(StoreConfig::session().label, "sessionStorage");
        assert_eq!(StoreConfig::local().empty_values, EmptyValuePolicy::Preserve);
    }
}
