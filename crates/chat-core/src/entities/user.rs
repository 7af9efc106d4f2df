//! Current user entity

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// The authenticated user, as returned by `GET /users/@me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Snowflake,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CurrentUser {
    /// Name to show in logs and UIs
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}
