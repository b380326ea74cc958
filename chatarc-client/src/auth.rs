use async_trait::async_trait;

use crate::error::Result;

/// External credential collaborator. The client only needs this contract;
/// how tokens are discovered is the supplier's business.
#[async_trait]
pub trait CredentialSupplier: Send + Sync {
    /// Produce a bearer token, or fail.
    async fn token(&self) -> Result<String>;

    /// Produce a fresh token after the previous one was rejected. Defaults
    /// to a plain `token()` call for suppliers without a refresh path.
    async fn refresh(&self) -> Result<String> {
        self.token().await
    }
}

/// A fixed token handed in up front (flag, environment, config file).
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> BearerToken {
        BearerToken {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialSupplier for BearerToken {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
