//! Resolution of verified claims into a caller identity

use atelier_common::TenantId;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::claims::Claims;
use crate::error::{AuthError, Result};
use crate::roles::{Role, RoleKind, RoleScopeRegistry};

/// Who is calling
///
/// Humans carry a role from the registry; services carry only the scopes
/// their client was granted, capped by the `m2m_service` entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    Human {
        subject: String,
        role: Role,
        overlays: Vec<Role>,
        /// Absent for platform roles and for users still onboarding
        tenant_id: Option<TenantId>,
        scopes: BTreeSet<String>,
    },
    Service {
        client_id: String,
        tenant_id: Option<TenantId>,
        scopes: BTreeSet<String>,
    },
}

impl Identity {
    pub fn resolve(claims: &Claims, registry: &RoleScopeRegistry) -> Result<Self> {
        if claims.is_machine() {
            resolve_service(claims, registry)
        } else {
            resolve_human(claims, registry)
        }
    }

    /// Stable id of the principal: subject for humans, client id for services
    pub fn principal_id(&self) -> &str {
        match self {
            Identity::Human { subject, .. } => subject,
            Identity::Service { client_id, .. } => client_id,
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            Identity::Human { tenant_id, .. } | Identity::Service { tenant_id, .. } => {
                tenant_id.as_ref()
            }
        }
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        match self {
            Identity::Human { scopes, .. } | Identity::Service { scopes, .. } => scopes,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Identity::Human { role, .. } => Some(*role),
            Identity::Service { .. } => None,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Identity::Service { .. })
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(scope)
    }

    pub fn require_scopes<S: AsRef<str>>(&self, required: &[S]) -> Result<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|scope| !self.has_scope(scope.as_ref()))
            .map(|scope| scope.as_ref().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope { missing })
        }
    }
}

fn resolve_service(claims: &Claims, registry: &RoleScopeRegistry) -> Result<Identity> {
    let client_id = claims
        .client_id
        .clone()
        .or_else(|| {
            claims
                .subject
                .as_deref()
                .and_then(|s| s.strip_suffix("@clients"))
                .map(str::to_string)
        })
        .ok_or_else(|| AuthError::malformed("client credential token without client id"))?;

    let scopes = cap_scopes(&claims.scopes, registry.scopes_for(Role::M2mService));
    if scopes.len() < claims.scopes.len() {
        debug!(
            client_id = %client_id,
            granted = claims.scopes.len(),
            effective = scopes.len(),
            "Dropped service scopes outside the m2m entitlement"
        );
    }

    Ok(Identity::Service {
        client_id,
        tenant_id: claims.tenant_id.clone(),
        scopes,
    })
}

fn resolve_human(claims: &Claims, registry: &RoleScopeRegistry) -> Result<Identity> {
    let subject = claims
        .subject
        .clone()
        .ok_or_else(|| AuthError::malformed("token has no subject"))?;

    let mut primary = None;
    let mut overlays = Vec::new();
    for name in &claims.roles {
        let role = match name.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                warn!(subject = %subject, "Ignoring role claim: {}", e);
                continue;
            }
        };
        match role.kind() {
            RoleKind::Overlay => overlays.push(role),
            RoleKind::Service => {
                warn!(subject = %subject, "Ignoring service role on a user token");
            }
            RoleKind::Platform | RoleKind::Tenant if primary.is_none() => primary = Some(role),
            RoleKind::Platform | RoleKind::Tenant => {
                debug!(subject = %subject, role = %role, "Ignoring additional primary role");
            }
        }
    }

    let role = primary.unwrap_or(Role::Customer);
    if !overlays.is_empty() && role != Role::TeamMember {
        warn!(subject = %subject, role = %role, "Overlays only apply to team members, ignoring");
        overlays.clear();
    }

    let tenant_id = match (role.kind(), &claims.tenant_id) {
        (RoleKind::Platform, Some(tenant)) => {
            warn!(subject = %subject, tenant = %tenant, "Platform role token carries a tenant, ignoring it");
            None
        }
        (_, tenant) => tenant.clone(),
    };

    let entitled = registry.scopes_for_all(role, &overlays);
    let scopes = if claims.scopes.is_empty() {
        entitled.iter().map(|s| s.to_string()).collect()
    } else {
        cap_scopes(&claims.scopes, &entitled)
    };

    Ok(Identity::Human {
        subject,
        role,
        overlays,
        tenant_id,
        scopes,
    })
}

/// Token scopes can narrow an entitlement, never widen it
fn cap_scopes(granted: &BTreeSet<String>, entitled: &BTreeSet<&'static str>) -> BTreeSet<String> {
    granted
        .iter()
        .filter(|scope| entitled.contains(scope.as_str()))
        .cloned()
        .collect()
}
