use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Credentials for pulling the workload image from a private registry
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct PrivateRegistry {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for PrivateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateRegistry")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
