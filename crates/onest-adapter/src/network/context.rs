use serde::{Deserialize, Serialize};

/// Code/name pair used for cities, countries, and states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLocation {
    #[serde(default)]
    pub city: CodedName,
    #[serde(default)]
    pub country: CodedName,
}

/// Envelope header shared by every action and callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub bap_id: String,
    #[serde(default)]
    pub bap_uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bpp_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bpp_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ContextLocation>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ttl: String,
}
