//! Identifier newtypes and the capability enum.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Logical client identity (e.g. `"visual-agent"`)
    CallerId
);

string_id!(
    /// Model pool identifier
    PoolId
);

string_id!(
    /// Upstream platform identifier
    PlatformId
);

/// Unique request identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random request id
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Logical model-type category a caller requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Conversational chat completion
    Chat,
    /// Short intent / classification calls
    Intent,
    /// Image understanding
    Vision,
    /// Image or media generation
    Generation,
    /// Text embeddings
    Embedding,
}

impl Capability {
    /// All capabilities, in declaration order
    pub const ALL: [Self; 5] = [
        Self::Chat,
        Self::Intent,
        Self::Vision,
        Self::Generation,
        Self::Embedding,
    ];

    /// Canonical lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Intent => "intent",
            Self::Vision => "vision",
            Self::Generation => "generation",
            Self::Embedding => "embedding",
        }
    }

    /// Generation calls run much longer than text calls
    #[must_use]
    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Generation)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = crate::error::GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "intent" => Ok(Self::Intent),
            "vision" => Ok(Self::Vision),
            "generation" | "image-gen" | "imagegen" => Ok(Self::Generation),
            "embedding" | "embeddings" => Ok(Self::Embedding),
            other => Err(crate::error::GatewayError::configuration(format!(
                "unknown capability '{other}'"
            ))),
        }
    }
}
