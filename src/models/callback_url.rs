use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::version::ApiVersion;
use crate::visibility::VersionedResource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackUrl {
    pub id: Uuid,
    pub url: String,
    pub version: ApiVersion,
    pub created_at: DateTime<Utc>,
}

impl CallbackUrl {
    pub fn new(url: String, version: ApiVersion) -> Self {
        Self {
            id: Uuid::now_v7(),
            url,
            version,
            created_at: Utc::now(),
        }
    }
}

impl VersionedResource for CallbackUrl {
    fn created_in_version(&self) -> ApiVersion {
        self.version
    }
}
