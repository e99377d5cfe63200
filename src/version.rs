use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Every API release the simulator serves, in release order.
///
/// Ordering is by declared position only. Labels look like semver but are
/// never compared as strings or version numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V3_0,
    V3_1,
    V3_1_1,
    V3_1_2,
    V3_1_3,
    V3_1_4,
    V3_1_5,
    V3_1_6,
    V3_1_7,
    V3_1_8,
    V3_1_9,
    V3_1_10,
    V3_1_11,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVersion(pub String);

impl fmt::Display for UnknownVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown API version '{}'", self.0)
    }
}

impl std::error::Error for UnknownVersion {}

impl ApiVersion {
    pub const ALL: [ApiVersion; 13] = [
        ApiVersion::V3_0,
        ApiVersion::V3_1,
        ApiVersion::V3_1_1,
        ApiVersion::V3_1_2,
        ApiVersion::V3_1_3,
        ApiVersion::V3_1_4,
        ApiVersion::V3_1_5,
        ApiVersion::V3_1_6,
        ApiVersion::V3_1_7,
        ApiVersion::V3_1_8,
        ApiVersion::V3_1_9,
        ApiVersion::V3_1_10,
        ApiVersion::V3_1_11,
    ];

    pub const EARLIEST: ApiVersion = ApiVersion::V3_0;
    pub const LATEST: ApiVersion = ApiVersion::V3_1_11;

    /// Accepts both `"3.1.2"` and `"v3.1.2"`.
    pub fn parse(label: &str) -> Result<Self, UnknownVersion> {
        let trimmed = label.strip_prefix('v').unwrap_or(label);
        Self::ALL
            .iter()
            .copied()
            .find(|v| &v.as_str()[1..] == trimmed)
            .ok_or_else(|| UnknownVersion(label.to_string()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V3_0 => "v3.0",
            ApiVersion::V3_1 => "v3.1",
            ApiVersion::V3_1_1 => "v3.1.1",
            ApiVersion::V3_1_2 => "v3.1.2",
            ApiVersion::V3_1_3 => "v3.1.3",
            ApiVersion::V3_1_4 => "v3.1.4",
            ApiVersion::V3_1_5 => "v3.1.5",
            ApiVersion::V3_1_6 => "v3.1.6",
            ApiVersion::V3_1_7 => "v3.1.7",
            ApiVersion::V3_1_8 => "v3.1.8",
            ApiVersion::V3_1_9 => "v3.1.9",
            ApiVersion::V3_1_10 => "v3.1.10",
            ApiVersion::V3_1_11 => "v3.1.11",
        }
    }

    fn position(self) -> usize {
        self as usize
    }

    /// `true` if `self` was released strictly after `other`.
    pub fn is_after(self, other: ApiVersion) -> bool {
        self.position() > other.position()
    }

    pub fn is_same_or_after(self, other: ApiVersion) -> bool {
        self.position() >= other.position()
    }

    /// The immediately preceding release, `None` for the earliest.
    pub fn previous(self) -> Option<ApiVersion> {
        self.position().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Releases before 3.1.3 still take `x-fapi-financial-id` from the caller.
    pub fn receives_financial_id(self) -> bool {
        !self.is_same_or_after(ApiVersion::V3_1_3)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApiVersion::parse(s)
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        ApiVersion::parse(&label).map_err(serde::de::Error::custom)
    }
}
