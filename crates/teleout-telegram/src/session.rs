use serde::{Deserialize, Serialize};

use teleout_core::Result;

/// Contents of the stored session blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: Option<String>,

    // Identity seen at sign-in; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl SessionData {
    pub fn decode(blob: Option<&[u8]>) -> Result<Self> {
        match blob {
            None => Ok(Self::default()),
            Some(data) => Ok(serde_json::from_slice(data)?),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
