use serde_json::{Map, Value};

use crate::version::ApiVersion;

/// A resource that remembers the API release it was created through.
pub trait VersionedResource {
    fn created_in_version(&self) -> ApiVersion;
}

/// A resource is visible through its own release and every later one, never
/// through an earlier one.
pub fn is_visible(resource_version: ApiVersion, request_version: ApiVersion) -> bool {
    request_version == resource_version || request_version.is_after(resource_version)
}

pub fn filter_visible<T, I>(resources: I, request_version: ApiVersion) -> Vec<T>
where
    T: VersionedResource,
    I: IntoIterator<Item = T>,
{
    resources
        .into_iter()
        .filter(|r| is_visible(r.created_in_version(), request_version))
        .collect()
}

/// An optional top-level block of a response body that only exists from a
/// given release onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeSection {
    pub name: &'static str,
    pub introduced_in: ApiVersion,
}

impl EnvelopeSection {
    pub const PAYMENT_LINKS: EnvelopeSection = EnvelopeSection {
        name: "Links",
        introduced_in: ApiVersion::V3_0,
    };
    pub const PAYMENT_META: EnvelopeSection = EnvelopeSection {
        name: "Meta",
        introduced_in: ApiVersion::V3_0,
    };
    pub const CALLBACK_LINKS: EnvelopeSection = EnvelopeSection {
        name: "Links",
        introduced_in: ApiVersion::V3_1,
    };
    pub const CALLBACK_META: EnvelopeSection = EnvelopeSection {
        name: "Meta",
        introduced_in: ApiVersion::V3_1,
    };

    pub fn populate(self, request_version: ApiVersion) -> bool {
        request_version.is_same_or_after(self.introduced_in)
    }
}

/// Insert `value` under the section's key when the requesting release carries
/// the section. Otherwise the key is left out entirely.
pub fn insert_section(
    body: &mut Map<String, Value>,
    section: EnvelopeSection,
    request_version: ApiVersion,
    value: impl FnOnce() -> Value,
) {
    if section.populate(request_version) {
        body.insert(section.name.to_string(), value());
    }
}
