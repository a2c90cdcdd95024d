//! Role taxonomy and the static role to scope table
//!
//! Each role is described by a composition: the roles it builds on, scopes
//! it adds and scopes it removes. Compositions are resolved once when the
//! registry is built into flat, independent scope sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::scopes::{self, *};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown role '{0}'")]
pub struct UnknownRole(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PlatformSuperAdmin,
    PlatformAdmin,
    PlatformSupport,
    TenantOwner,
    TenantAdmin,
    Artisan,
    TeamMember,
    Customer,
    ProjectManager,
    Accountant,
    M2mService,
}

/// Where a role sits in the tenancy model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Operates across all tenants, never bound to one
    Platform,
    /// Bound to a single tenant
    Tenant,
    /// Extra capabilities a team member can carry on top of their role
    Overlay,
    /// Machine clients using client credentials
    Service,
}

impl Role {
    /// Declaration order; the registry is indexed by it
    pub const ALL: [Role; 11] = [
        Role::PlatformSuperAdmin,
        Role::PlatformAdmin,
        Role::PlatformSupport,
        Role::TenantOwner,
        Role::TenantAdmin,
        Role::Artisan,
        Role::TeamMember,
        Role::Customer,
        Role::ProjectManager,
        Role::Accountant,
        Role::M2mService,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::PlatformSuperAdmin => "platform_super_admin",
            Role::PlatformAdmin => "platform_admin",
            Role::PlatformSupport => "platform_support",
            Role::TenantOwner => "tenant_owner",
            Role::TenantAdmin => "tenant_admin",
            Role::Artisan => "artisan",
            Role::TeamMember => "team_member",
            Role::Customer => "customer",
            Role::ProjectManager => "project_manager",
            Role::Accountant => "accountant",
            Role::M2mService => "m2m_service",
        }
    }

    pub fn kind(self) -> RoleKind {
        match self {
            Role::PlatformSuperAdmin | Role::PlatformAdmin | Role::PlatformSupport => {
                RoleKind::Platform
            }
            Role::TenantOwner
            | Role::TenantAdmin
            | Role::Artisan
            | Role::TeamMember
            | Role::Customer => RoleKind::Tenant,
            Role::ProjectManager | Role::Accountant => RoleKind::Overlay,
            Role::M2mService => RoleKind::Service,
        }
    }

    /// May act on any tenant's resources
    pub fn is_platform_admin(self) -> bool {
        matches!(self, Role::PlatformSuperAdmin | Role::PlatformAdmin)
    }

    /// May read any tenant's resources
    pub fn is_platform_support(self) -> bool {
        matches!(self, Role::PlatformSupport)
    }

    /// May act on resources of their own tenant
    pub fn is_tenant_admin(self) -> bool {
        matches!(self, Role::TenantOwner | Role::TenantAdmin)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A resolved role entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub role: Role,
    pub description: &'static str,
    pub kind: RoleKind,
    pub scopes: BTreeSet<&'static str>,
}

struct Composition {
    description: &'static str,
    base: Vec<Role>,
    extra: Vec<&'static str>,
    exclude: Vec<&'static str>,
}

impl Composition {
    fn new(description: &'static str) -> Self {
        Self {
            description,
            base: Vec::new(),
            extra: Vec::new(),
            exclude: Vec::new(),
        }
    }

    fn base(mut self, roles: &[Role]) -> Self {
        self.base.extend_from_slice(roles);
        self
    }

    fn extra(mut self, scopes: impl IntoIterator<Item = &'static str>) -> Self {
        self.extra.extend(scopes);
        self
    }

    fn exclude(mut self, scopes: &[&'static str]) -> Self {
        self.exclude.extend_from_slice(scopes);
        self
    }
}

fn composition(role: Role) -> Composition {
    match role {
        Role::PlatformSuperAdmin => {
            Composition::new("Unrestricted platform operator").extra(scopes::all())
        }
        Role::PlatformAdmin => Composition::new("Platform operator without platform administration")
            .base(&[Role::PlatformSuperAdmin])
            .exclude(&[PLATFORM_ADMIN]),
        Role::PlatformSupport => {
            Composition::new("Read-only support staff across tenants").extra(scopes::read_only())
        }
        Role::TenantOwner => Composition::new("Owner of a tenant with full control over it")
            .extra(TENANT_SCOPES.iter().copied()),
        Role::TenantAdmin => Composition::new("Tenant administrator without irreversible actions")
            .base(&[Role::TenantOwner])
            .exclude(&[TENANT_DELETE, BILLING_MANAGE, PAYMENT_REFUND]),
        Role::Artisan => Composition::new("Service provider selling through a tenant")
            .base(&[Role::TeamMember])
            .extra([CATALOG_WRITE, INVOICE_WRITE, REPORT_READ]),
        Role::TeamMember => Composition::new("Member of a tenant's staff")
            .base(&[Role::Customer])
            .extra([PROJECT_WRITE, MEMBER_READ, TENANT_READ]),
        Role::Customer => Composition::new("Buyer booking services from a tenant").extra([
            BOOKING_READ,
            BOOKING_WRITE,
            BOOKING_CANCEL,
            INVOICE_READ,
            PAYMENT_READ,
            PROJECT_READ,
            MESSAGE_READ,
            MESSAGE_WRITE,
            CATALOG_READ,
            REVIEW_READ,
            REVIEW_WRITE,
        ]),
        Role::ProjectManager => Composition::new("Team member who runs projects").extra([
            PROJECT_READ,
            PROJECT_WRITE,
            PROJECT_DELETE,
            MEMBER_READ,
            REPORT_READ,
        ]),
        Role::Accountant => Composition::new("Team member who handles invoicing").extra([
            INVOICE_READ,
            INVOICE_WRITE,
            INVOICE_VOID,
            PAYMENT_READ,
            BILLING_READ,
            REPORT_READ,
        ]),
        Role::M2mService => Composition::new("Machine client using client credentials").extra([
            BOOKING_READ,
            BOOKING_WRITE,
            INVOICE_READ,
            INVOICE_WRITE,
            PAYMENT_READ,
            PROJECT_READ,
            MESSAGE_WRITE,
            CATALOG_READ,
            TENANT_READ,
        ]),
    }
}

fn resolve(role: Role, resolved: &mut [Option<BTreeSet<&'static str>>]) -> BTreeSet<&'static str> {
    if let Some(scopes) = &resolved[role.index()] {
        return scopes.clone();
    }

    let composed = composition(role);
    let mut scopes = BTreeSet::new();
    for base in composed.base {
        scopes.extend(resolve(base, resolved));
    }
    scopes.extend(composed.extra);
    for excluded in &composed.exclude {
        scopes.remove(excluded);
    }

    resolved[role.index()] = Some(scopes.clone());
    scopes
}

/// Immutable role to scope table
#[derive(Debug, Clone)]
pub struct RoleScopeRegistry {
    definitions: Vec<RoleDefinition>,
}

impl RoleScopeRegistry {
    pub fn new() -> Self {
        let mut resolved: Vec<Option<BTreeSet<&'static str>>> = vec![None; Role::ALL.len()];
        let definitions = Role::ALL
            .into_iter()
            .map(|role| RoleDefinition {
                role,
                description: composition(role).description,
                kind: role.kind(),
                scopes: resolve(role, &mut resolved),
            })
            .collect();
        Self { definitions }
    }

    pub fn definition(&self, role: Role) -> &RoleDefinition {
        &self.definitions[role.index()]
    }

    pub fn scopes_for(&self, role: Role) -> &BTreeSet<&'static str> {
        &self.definition(role).scopes
    }

    /// Union of a role's scopes with its overlays
    pub fn scopes_for_all(&self, role: Role, overlays: &[Role]) -> BTreeSet<&'static str> {
        let mut scopes = self.scopes_for(role).clone();
        for overlay in overlays {
            scopes.extend(self.scopes_for(*overlay).iter().copied());
        }
        scopes
    }

    pub fn roles(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.definitions.iter()
    }

    pub fn lookup(&self, name: &str) -> Option<&RoleDefinition> {
        name.parse::<Role>().ok().map(|role| self.definition(role))
    }
}

impl Default for RoleScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_every_role_has_scopes() {
        let registry = RoleScopeRegistry::new();
        for role in Role::ALL {
            let definition = registry.definition(role);
            assert_eq!(definition.role, role);
            assert!(!definition.scopes.is_empty(), "{role} has no scopes");
            assert!(
                definition.scopes.iter().all(|s| scopes::known(s).is_some()),
                "{role} grants an unknown scope"
            );
        }
        assert_eq!(registry.roles().count(), Role::ALL.len());
    }

    #[test]
    fn test_role_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!(
            "root".parse::<Role>(),
            Err(UnknownRole("root".to_string()))
        );
    }

    #[test]
    fn test_platform_roles() {
        let registry = RoleScopeRegistry::new();
        let super_admin = registry.scopes_for(Role::PlatformSuperAdmin);
        let admin = registry.scopes_for(Role::PlatformAdmin);

        assert_eq!(super_admin.len(), scopes::all().count());
        assert!(!admin.contains(PLATFORM_ADMIN));
        assert_eq!(admin.len(), super_admin.len() - 1);
        assert!(registry
            .scopes_for(Role::PlatformSupport)
            .iter()
            .all(|s| s.ends_with(":read")));
    }

    #[test]
    fn test_tenant_admin_excludes_irreversible_actions() {
        let registry = RoleScopeRegistry::new();
        let owner = registry.scopes_for(Role::TenantOwner);
        let admin = registry.scopes_for(Role::TenantAdmin);

        for scope in [TENANT_DELETE, BILLING_MANAGE, PAYMENT_REFUND] {
            assert!(owner.contains(scope));
            assert!(!admin.contains(scope));
        }
        assert!(admin.is_subset(owner));
    }

    #[test]
    fn test_tenant_roles_narrow_progressively() {
        let registry = RoleScopeRegistry::new();
        let owner = registry.scopes_for(Role::TenantOwner);
        let artisan = registry.scopes_for(Role::Artisan);
        let member = registry.scopes_for(Role::TeamMember);
        let customer = registry.scopes_for(Role::Customer);

        assert!(artisan.is_subset(owner));
        assert!(member.is_subset(artisan) && member.len() < artisan.len());
        assert!(customer.is_subset(member) && customer.len() < member.len());
    }

    #[test]
    fn test_tenant_bound_roles_stay_inside_tenant() {
        let registry = RoleScopeRegistry::new();
        let tenant_scopes: BTreeSet<&str> = TENANT_SCOPES.iter().copied().collect();
        for definition in registry.roles().filter(|d| d.kind != RoleKind::Platform) {
            assert!(
                definition.scopes.is_subset(&tenant_scopes),
                "{} grants platform scopes",
                definition.role
            );
        }
    }

    #[test]
    fn test_role_kinds() {
        assert_eq!(Role::PlatformSupport.kind(), RoleKind::Platform);
        assert_eq!(Role::Customer.kind(), RoleKind::Tenant);
        assert_eq!(Role::Accountant.kind(), RoleKind::Overlay);
        assert_eq!(Role::M2mService.kind(), RoleKind::Service);
        assert!(Role::PlatformAdmin.is_platform_admin());
        assert!(!Role::PlatformSupport.is_platform_admin());
        assert!(Role::TenantAdmin.is_tenant_admin());
        assert!(!Role::Artisan.is_tenant_admin());
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = RoleScopeRegistry::new();
        assert_eq!(
            registry.lookup("accountant").map(|d| d.role),
            Some(Role::Accountant)
        );
        assert!(registry.lookup("accounting").is_none());
    }

    proptest! {
        #[test]
        fn prop_overlays_never_mutate_base_sets(
            role_idx in 0..Role::ALL.len(),
            overlay_idx in proptest::collection::vec(0..Role::ALL.len(), 0..4),
        ) {
            let registry = RoleScopeRegistry::new();
            let role = Role::ALL[role_idx];
            let overlays: Vec<Role> = overlay_idx.into_iter().map(|i| Role::ALL[i]).collect();
            let before = registry.scopes_for(role).clone();

            let combined = registry.scopes_for_all(role, &overlays);

            prop_assert!(before.is_subset(&combined));
            for overlay in &overlays {
                prop_assert!(registry.scopes_for(*overlay).is_subset(&combined));
            }
            prop_assert_eq!(registry.scopes_for(role), &before);
            let fresh = RoleScopeRegistry::new();
            prop_assert_eq!(&fresh.definition(role).scopes, &before);
        }
    }
}
