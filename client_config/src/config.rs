//! Client configuration tree.
//!
//! Mirrors the authored configuration: a root [`ClientConfig`], an optional
//! [`TransportConfig`] specialization and an optional [`RetryPolicyConfig`]
//! specialization. Polymorphic nodes are tagged by `kind`. Unknown kinds are
//! kept as `Unrecognized` so the resolver can reject them by name instead of
//! the parser dropping them.

use std::{fmt, path::Path};

use serde::{
    de::{self, Deserializer, Visitor},
    ser::{self, Serializer},
    Deserialize, Serialize,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConfigResult;

/// Root of the configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Client flavor. Only `sdk` clients read the attempt timeout and retry policy.
    #[serde(default)]
    pub kind: ClientKind,

    /// Endpoint override, e.g. "https://bedrock-runtime.eu-west-1.amazonaws.com"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    /// Total time allowed for an API call, including retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_call_timeout_ms: Option<u64>,

    /// Transport specialization. Absent means the default transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportConfig>,

    /// Time allowed for a single attempt (sdk clients only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_call_attempt_timeout_ms: Option<u64>,

    /// Retry policy specialization (sdk clients only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicyConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    #[default]
    Basic,
    Sdk,
}

impl ClientConfig {
    /// Parse a configuration tree from YAML (JSON is valid YAML).
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a configuration tree from a YAML file.
    pub async fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&content)
    }
}

/// HTTP transport specialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Connection-pooling client.
    Apache(ApacheTransportConfig),
    /// Simple one-shot client.
    UrlConnection(UrlTransportConfig),
    /// A `kind` this build does not know about.
    Unrecognized(String),
}

impl TransportConfig {
    pub fn kind(&self) -> &str {
        match self {
            TransportConfig::Apache(_) => "apache",
            TransportConfig::UrlConnection(_) => "url_connection",
            TransportConfig::Unrecognized(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApacheTransportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_acquisition_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_max_idle_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_time_to_live_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_timeout_ms: Option<u64>,
    /// Local IP address to bind outgoing connections to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "TriState::is_unset")]
    pub expect_continue_enabled: TriState,
    #[serde(skip_serializing_if = "TriState::is_unset")]
    pub tcp_keep_alive: TriState,
    #[serde(skip_serializing_if = "TriState::is_unset")]
    pub use_idle_connection_reaper: TriState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UrlTransportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_timeout_ms: Option<u64>,
}

/// Retry policy specialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicyConfig {
    NoRetry,
    FixedCount(FixedCountRetryConfig),
    Unrecognized(String),
}

impl RetryPolicyConfig {
    pub fn kind(&self) -> &str {
        match self {
            RetryPolicyConfig::NoRetry => "no_retry",
            RetryPolicyConfig::FixedCount(_) => "fixed_count",
            RetryPolicyConfig::Unrecognized(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FixedCountRetryConfig {
    #[serde(alias = "max_attempts")]
    pub max_retries: u32,
}

/// Three-valued boolean. `Unset` defers to the transport's own default and
/// is never the same as `False`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriState {
    True,
    False,
    #[default]
    Unset,
}

impl TriState {
    pub fn as_option(self) -> Option<bool> {
        match self {
            TriState::True => Some(true),
            TriState::False => Some(false),
            TriState::Unset => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, TriState::Unset)
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::True,
            Some(false) => TriState::False,
            None => TriState::Unset,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}

impl Serialize for TriState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_option() {
            Some(value) => serializer.serialize_bool(value),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TriStateVisitor;

        impl<'de> Visitor<'de> for TriStateVisitor {
            type Value = TriState;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a boolean, \"true\", \"false\" or null")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(v.into())
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                let value = v.trim().trim_start_matches('_');
                if value.eq_ignore_ascii_case("true") {
                    Ok(TriState::True)
                } else if value.eq_ignore_ascii_case("false") {
                    Ok(TriState::False)
                } else {
                    debug!(value = v, "unrecognized boolean enum value, treated as unset");
                    Ok(TriState::Unset)
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                debug!(value = v, "unrecognized boolean enum value, treated as unset");
                Ok(TriState::Unset)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                debug!(value = v, "unrecognized boolean enum value, treated as unset");
                Ok(TriState::Unset)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                debug!(value = v, "unrecognized boolean enum value, treated as unset");
                Ok(TriState::Unset)
            }

            fn visit_seq<A: de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Self::Value, A::Error> {
                while seq.next_element::<de::IgnoredAny>()?.is_some() {}
                debug!("sequence given for boolean enum value, treated as unset");
                Ok(TriState::Unset)
            }

            fn visit_map<A: de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> Result<Self::Value, A::Error> {
                while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
                debug!("map given for boolean enum value, treated as unset");
                Ok(TriState::Unset)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(TriState::Unset)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(TriState::Unset)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
                d.deserialize_any(self)
            }
        }

        deserializer.deserialize_any(TriStateVisitor)
    }
}

// Polymorphic nodes are read as a map, the `kind` entry is split off and the
// remainder is decoded into the matching specialization.

fn split_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<(String, Value), D::Error> {
    let mut map = Map::<String, Value>::deserialize(deserializer)?;
    match map.remove("kind") {
        Some(Value::String(kind)) => Ok((kind, Value::Object(map))),
        Some(other) => Err(de::Error::custom(format!(
            "`kind` must be a string, got {}",
            other
        ))),
        None => Err(de::Error::missing_field("kind")),
    }
}

fn with_kind<S: Serializer>(
    serializer: S,
    kind: &str,
    body: Result<Value, serde_json::Error>,
) -> Result<S::Ok, S::Error> {
    let mut map = Map::new();
    map.insert("kind".to_string(), Value::String(kind.to_string()));
    match body.map_err(ser::Error::custom)? {
        Value::Object(fields) => map.extend(fields),
        Value::Null => {}
        other => {
            return Err(ser::Error::custom(format!(
                "expected an object body for '{}', got {}",
                kind, other
            )))
        }
    }
    Value::Object(map).serialize(serializer)
}

impl<'de> Deserialize<'de> for TransportConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, body) = split_kind(deserializer)?;
        match kind.as_str() {
            "apache" => serde_json::from_value(body)
                .map(TransportConfig::Apache)
                .map_err(de::Error::custom),
            "url_connection" => serde_json::from_value(body)
                .map(TransportConfig::UrlConnection)
                .map_err(de::Error::custom),
            _ => Ok(TransportConfig::Unrecognized(kind)),
        }
    }
}

impl Serialize for TransportConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            TransportConfig::Apache(config) => serde_json::to_value(config),
            TransportConfig::UrlConnection(config) => serde_json::to_value(config),
            TransportConfig::Unrecognized(_) => Ok(Value::Null),
        };
        with_kind(serializer, self.kind(), body)
    }
}

impl<'de> Deserialize<'de> for RetryPolicyConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, body) = split_kind(deserializer)?;
        match kind.as_str() {
            "no_retry" => Ok(RetryPolicyConfig::NoRetry),
            "fixed_count" => serde_json::from_value(body)
                .map(RetryPolicyConfig::FixedCount)
                .map_err(de::Error::custom),
            _ => Ok(RetryPolicyConfig::Unrecognized(kind)),
        }
    }
}

impl Serialize for RetryPolicyConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            RetryPolicyConfig::FixedCount(config) => serde_json::to_value(config),
            RetryPolicyConfig::NoRetry | RetryPolicyConfig::Unrecognized(_) => Ok(Value::Null),
        };
        with_kind(serializer, self.kind(), body)
    }
}
