//! Principal store adapters implementing `PrincipalLookup`.
//!
//! The store owns users, their credential digests, role assignments and the
//! role → permission mapping. The credential layer only ever reads from it.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryPrincipalStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresPrincipalStore;

use stockgate_auth::{
    permissions::catalog::*,
    roles::{ROLE_ADMIN, ROLE_MANAGER, ROLE_USER},
    Permission, Role, RoleGrant,
};

/// Default role → permission mapping used to seed development stores.
pub fn default_role_permissions(role: &Role) -> Vec<Permission> {
    match role.as_str() {
        "ROLE_ADMIN" => vec![
            PRODUCT_READ,
            PRODUCT_WRITE,
            ORDER_READ,
            ORDER_WRITE,
            INVENTORY_WRITE,
            SUPPLIER_WRITE,
            REPORT_VIEW,
            USER_MANAGE,
        ],
        "ROLE_MANAGER" => vec![
            PRODUCT_READ,
            PRODUCT_WRITE,
            ORDER_READ,
            ORDER_WRITE,
            INVENTORY_WRITE,
            SUPPLIER_WRITE,
            REPORT_VIEW,
        ],
        "ROLE_USER" => vec![PRODUCT_READ, ORDER_READ, ORDER_WRITE],
        _ => Vec::new(),
    }
}

/// Grant for `role` carrying its default permissions.
pub fn default_grant(role: Role) -> RoleGrant {
    let permissions = default_role_permissions(&role);
    RoleGrant::new(role, permissions)
}

/// Known roles, for seeding and display.
pub fn known_roles() -> [Role; 3] {
    [ROLE_ADMIN, ROLE_MANAGER, ROLE_USER]
}
