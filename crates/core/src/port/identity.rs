// Identity Resolver Port

use crate::domain::UserId;
use crate::error::Result;
use async_trait::async_trait;

/// Display data of the user who started a deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Look up a user; `None` when the identity no longer exists
    async fn resolve(&self, id: UserId) -> Result<Option<Identity>>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    /// Fixed directory of identities
    #[derive(Default)]
    pub struct StaticIdentityResolver {
        identities: HashMap<UserId, Identity>,
    }

    impl StaticIdentityResolver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, id: UserId, name: &str, email: Option<&str>) -> Self {
            self.identities.insert(
                id,
                Identity {
                    id,
                    display_name: name.to_string(),
                    email: email.map(str::to_string),
                },
            );
            self
        }
    }

    #[async_trait]
    impl IdentityResolver for StaticIdentityResolver {
        async fn resolve(&self, id: UserId) -> Result<Option<Identity>> {
            Ok(self.identities.get(&id).cloned())
        }
    }
}
