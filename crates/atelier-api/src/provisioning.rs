//! Local account provisioning for authenticated humans
//!
//! The identity provider owns credentials; the marketplace keeps its own
//! account row per subject. Accounts are created on first sight.

use async_trait::async_trait;
use atelier_auth::Identity;
use atelier_common::TenantId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Account store unavailable: {0}")]
    Unavailable(String),

    #[error("Account rejected: {0}")]
    Rejected(String),
}

impl ProvisioningError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProvisioningError::Unavailable(_))
    }
}

/// Marketplace account linked to an identity provider subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAccount {
    pub id: String,
    pub subject: String,
    pub tenant_id: Option<TenantId>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    /// Return the local account id for a human identity, creating it if needed
    async fn ensure_account(
        &self,
        identity: &Identity,
        email: Option<&str>,
    ) -> Result<String, ProvisioningError>;
}

/// Process-local account table
#[derive(Debug, Default)]
pub struct InMemoryProvisioner {
    accounts: RwLock<HashMap<String, LocalAccount>>,
}

impl InMemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject: &str) -> Option<LocalAccount> {
        self.accounts.read().get(subject).cloned()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

#[async_trait]
impl AccountProvisioner for InMemoryProvisioner {
    async fn ensure_account(
        &self,
        identity: &Identity,
        email: Option<&str>,
    ) -> Result<String, ProvisioningError> {
        let Identity::Human {
            subject, tenant_id, ..
        } = identity
        else {
            return Err(ProvisioningError::Rejected(
                "service principals have no local account".to_string(),
            ));
        };

        if let Some(existing) = self.accounts.read().get(subject) {
            return Ok(existing.id.clone());
        }

        let mut accounts = self.accounts.write();
        // another request may have created it between the two locks
        let account = accounts.entry(subject.clone()).or_insert_with(|| {
            let account = LocalAccount {
                id: Uuid::new_v4().to_string(),
                subject: subject.clone(),
                tenant_id: tenant_id.clone(),
                email: email.map(str::to_string),
                created_at: Utc::now(),
            };
            info!(subject = %account.subject, account_id = %account.id, "Provisioned local account");
            account
        });
        Ok(account.id.clone())
    }
}
