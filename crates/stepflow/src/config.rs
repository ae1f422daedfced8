//! Flow configuration.

use serde::Deserialize;

/// Configuration for a [`Flow`](crate::Flow).
///
/// Controls how the request and storage keys of a flow are derived from its
/// name. Deserializable so hosts can embed it in their own config files.
///
/// # Examples
///
/// ```
/// use stepflow::FlowConfig;
///
/// let config = FlowConfig::default().with_storage_suffix("tenant-7");
/// assert_eq!(config.transition_key("checkout"), "flow_checkout_transition");
/// assert_eq!(config.storage_key("checkout"), "flow_checkout_storage.tenant-7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Prefix of every derived key. Default: `flow`.
    pub key_prefix: String,
    /// Appended to the storage key to keep several instances of the same
    /// flow apart. Default: none.
    pub storage_suffix: Option<String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            key_prefix: "flow".to_string(),
            storage_suffix: None,
        }
    }
}

impl FlowConfig {
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_storage_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.storage_suffix = Some(suffix.into());
        self
    }

    /// Request field carrying the transition token of the named flow.
    pub fn transition_key(&self, flow: &str) -> String {
        format!("{}_{}_transition", self.key_prefix, flow)
    }

    /// Storage key the named flow's context lives under.
    pub fn storage_key(&self, flow: &str) -> String {
        match &self.storage_suffix {
            Some(suffix) => format!("{}_{}_storage.{}", self.key_prefix, flow, suffix),
            None => format!("{}_{}_storage", self.key_prefix, flow),
        }
    }
}
