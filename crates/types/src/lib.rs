use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attribute values as reported by the Matter server.
pub type AttributeValue = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("attribute path must have three segments (endpoint/cluster/attribute), got {0:?}")]
    SegmentCount(String),
    #[error("invalid {segment} id {value:?} in attribute path")]
    InvalidSegment {
        segment: &'static str,
        value: String,
    },
}

/// One addressable attribute on a device: `endpoint/cluster/attribute`.
///
/// The Matter server keys attributes by the string form, both in requests and
/// in read results, so the type carries an explicit encode/decode pair
/// (`Display` / `FromStr`) and serializes as that string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributePath {
    pub endpoint_id: u16,
    pub cluster_id: u32,
    pub attribute_id: u32,
}

impl AttributePath {
    pub fn new(endpoint_id: u16, cluster_id: u32, attribute_id: u32) -> Self {
        Self {
            endpoint_id,
            cluster_id,
            attribute_id,
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.endpoint_id, self.cluster_id, self.attribute_id
        )
    }
}

impl FromStr for AttributePath {
    type Err = PathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = value.split('/').collect();
        let [endpoint, cluster, attribute] = segments.as_slice() else {
            return Err(PathError::SegmentCount(value.to_string()));
        };

        Ok(Self {
            endpoint_id: parse_segment("endpoint", endpoint)?,
            cluster_id: parse_segment("cluster", cluster)?,
            attribute_id: parse_segment("attribute", attribute)?,
        })
    }
}

impl TryFrom<String> for AttributePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttributePath> for String {
    fn from(path: AttributePath) -> Self {
        path.to_string()
    }
}

fn parse_segment<T: FromStr>(segment: &'static str, value: &str) -> Result<T, PathError> {
    // `u16::from_str` accepts a leading '+', the wire format does not.
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PathError::InvalidSegment {
            segment,
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| PathError::InvalidSegment {
        segment,
        value: value.to_string(),
    })
}

/// A single read-write-verify request, fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRequest {
    pub node_id: u64,
    pub path: AttributePath,
    pub desired_value: i64,
    pub server_url: String,
}

impl ConfigurationRequest {
    pub fn new(
        node_id: u64,
        path: AttributePath,
        desired_value: i64,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            node_id,
            path,
            desired_value,
            server_url: server_url.into(),
        }
    }
}
