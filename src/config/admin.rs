use serde::{Deserialize, Serialize};

use crate::types::secret::Secret;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<Secret<String>>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { api_token: None }
    }
}
