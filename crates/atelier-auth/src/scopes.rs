//! Scope vocabulary
//!
//! A scope is a single granted capability, written `resource:action`.
//! Matching is always by exact string equality.

use std::collections::BTreeSet;

pub const BOOKING_READ: &str = "booking:read";
pub const BOOKING_WRITE: &str = "booking:write";
pub const BOOKING_CANCEL: &str = "booking:cancel";

pub const INVOICE_READ: &str = "invoice:read";
pub const INVOICE_WRITE: &str = "invoice:write";
pub const INVOICE_VOID: &str = "invoice:void";

pub const PAYMENT_READ: &str = "payment:read";
pub const PAYMENT_REFUND: &str = "payment:refund";

pub const PROJECT_READ: &str = "project:read";
pub const PROJECT_WRITE: &str = "project:write";
pub const PROJECT_DELETE: &str = "project:delete";

pub const MESSAGE_READ: &str = "message:read";
pub const MESSAGE_WRITE: &str = "message:write";

pub const CATALOG_READ: &str = "catalog:read";
pub const CATALOG_WRITE: &str = "catalog:write";

pub const REVIEW_READ: &str = "review:read";
pub const REVIEW_WRITE: &str = "review:write";

pub const MEMBER_READ: &str = "member:read";
pub const MEMBER_MANAGE: &str = "member:manage";

pub const TENANT_READ: &str = "tenant:read";
pub const TENANT_MANAGE: &str = "tenant:manage";
pub const TENANT_DELETE: &str = "tenant:delete";

pub const BILLING_READ: &str = "billing:read";
pub const BILLING_MANAGE: &str = "billing:manage";

pub const REPORT_READ: &str = "report:read";

pub const USER_READ: &str = "user:read";
pub const USER_MANAGE: &str = "user:manage";

pub const PLATFORM_READ: &str = "platform:read";
pub const PLATFORM_MANAGE: &str = "platform:manage";
pub const PLATFORM_ADMIN: &str = "platform:admin";

/// Grants every scope for one resource. Only API keys honour it.
pub const WILDCARD: &str = "*";

/// Scopes that operate on data inside a single tenant
pub const TENANT_SCOPES: &[&str] = &[
    BOOKING_READ,
    BOOKING_WRITE,
    BOOKING_CANCEL,
    INVOICE_READ,
    INVOICE_WRITE,
    INVOICE_VOID,
    PAYMENT_READ,
    PAYMENT_REFUND,
    PROJECT_READ,
    PROJECT_WRITE,
    PROJECT_DELETE,
    MESSAGE_READ,
    MESSAGE_WRITE,
    CATALOG_READ,
    CATALOG_WRITE,
    REVIEW_READ,
    REVIEW_WRITE,
    MEMBER_READ,
    MEMBER_MANAGE,
    TENANT_READ,
    TENANT_MANAGE,
    TENANT_DELETE,
    BILLING_READ,
    BILLING_MANAGE,
    REPORT_READ,
];

/// Scopes that only make sense across tenants
pub const PLATFORM_SCOPES: &[&str] = &[
    USER_READ,
    USER_MANAGE,
    PLATFORM_READ,
    PLATFORM_MANAGE,
    PLATFORM_ADMIN,
];

/// Every scope known to the registry
pub fn all() -> impl Iterator<Item = &'static str> {
    TENANT_SCOPES.iter().chain(PLATFORM_SCOPES.iter()).copied()
}

/// Every read-only scope
pub fn read_only() -> impl Iterator<Item = &'static str> {
    all().filter(|scope| scope.ends_with(":read"))
}

/// Resolve a scope string to its static form, if it is part of the vocabulary
pub fn known(scope: &str) -> Option<&'static str> {
    all().find(|known| *known == scope)
}

/// Split a space-delimited `scope` claim into a deduplicated set
pub fn parse_scope_claim(claim: &str) -> BTreeSet<String> {
    claim.split_whitespace().map(str::to_string).collect()
}

/// Check a resource API key grant, honouring the wildcard
pub fn resource_key_allows<S: AsRef<str>>(granted: &[S], required: &str) -> bool {
    granted
        .iter()
        .any(|scope| scope.as_ref() == WILDCARD || scope.as_ref() == required)
}
