//! Tenant-aware access decisions
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. service callers are allowed (their scopes were already checked)
//! 2. a human acting on a resource they own is allowed
//! 3. platform administrators are allowed; platform support is allowed
//!    when the operation only needs read scopes
//! 4. tenant administrators are allowed inside their own tenant
//! 5. everything else is denied

use atelier_common::TenantId;
use serde::Serialize;
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::identity::Identity;
use crate::scopes;

/// What a business operation is about to touch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessContext {
    pub required_scopes: Vec<String>,
    pub target_tenant: Option<TenantId>,
    /// Subject that owns the resource, when ownership applies
    pub resource_owner: Option<String>,
}

impl AccessContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, scope: impl Into<String>) -> Self {
        self.required_scopes.push(scope.into());
        self
    }

    pub fn in_tenant(mut self, tenant: TenantId) -> Self {
        self.target_tenant = Some(tenant);
        self
    }

    pub fn owned_by(mut self, subject: impl Into<String>) -> Self {
        self.resource_owner = Some(subject.into());
        self
    }
}

/// Which rule allowed the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    ServiceCaller,
    ResourceOwner,
    PlatformAdmin,
    PlatformSupport,
    TenantAdmin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Hold service tokens that name a tenant to that tenant
    service_tenant_binding: bool,
}

impl AccessPolicy {
    pub fn new(service_tenant_binding: bool) -> Self {
        Self {
            service_tenant_binding,
        }
    }

    /// Scope gate followed by [`AccessPolicy::decide`]
    pub fn check(&self, identity: &Identity, ctx: &AccessContext) -> Result<AllowReason> {
        identity.require_scopes(&ctx.required_scopes)?;
        self.decide(identity, ctx)
    }

    /// Apply the ownership and tenancy rules
    ///
    /// Caller scopes are not consulted. The required scopes only decide
    /// whether a read-only platform role may proceed.
    pub fn decide(&self, identity: &Identity, ctx: &AccessContext) -> Result<AllowReason> {
        let outcome = self.evaluate(identity, ctx);
        match &outcome {
            Ok(reason) => debug!(
                principal = identity.principal_id(),
                reason = ?reason,
                "Access allowed"
            ),
            Err(err) => debug!(
                principal = identity.principal_id(),
                target_tenant = ?ctx.target_tenant,
                "Access denied: {}",
                err
            ),
        }
        outcome
    }

    fn evaluate(&self, identity: &Identity, ctx: &AccessContext) -> Result<AllowReason> {
        let (subject, role, tenant_id) = match identity {
            Identity::Service { tenant_id, .. } => {
                if self.service_tenant_binding {
                    if let (Some(caller), Some(target)) = (tenant_id, &ctx.target_tenant) {
                        if caller != target {
                            return Err(AuthError::TenantMismatch);
                        }
                    }
                }
                return Ok(AllowReason::ServiceCaller);
            }
            Identity::Human {
                subject,
                role,
                tenant_id,
                ..
            } => (subject, *role, tenant_id),
        };

        if ctx.resource_owner.as_deref() == Some(subject.as_str()) {
            return Ok(AllowReason::ResourceOwner);
        }

        if role.is_platform_admin() {
            return Ok(AllowReason::PlatformAdmin);
        }

        if role.is_platform_support() && is_read_only(&ctx.required_scopes) {
            return Ok(AllowReason::PlatformSupport);
        }

        if role.is_tenant_admin() {
            return match &ctx.target_tenant {
                Some(target) if tenant_id.as_ref() == Some(target) => Ok(AllowReason::TenantAdmin),
                Some(_) => Err(AuthError::TenantMismatch),
                None => Err(AuthError::InsufficientPrivilege),
            };
        }

        Err(AuthError::InsufficientPrivilege)
    }
}

/// Non-empty and made only of read scopes
fn is_read_only(required: &[String]) -> bool {
    !required.is_empty()
        && required
            .iter()
            .all(|scope| scopes::read_only().any(|read| read == scope.as_str()))
}
