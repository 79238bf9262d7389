use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque, case-sensitive strings (e.g. "PRODUCT_WRITE") that
/// reach a principal only through its roles. They live in their own namespace:
/// a permission never satisfies a role requirement even if the names collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known permissions of the inventory backend.
pub mod catalog {
    use super::Permission;

    pub const PRODUCT_READ: Permission = Permission::from_static("PRODUCT_READ");
    pub const PRODUCT_WRITE: Permission = Permission::from_static("PRODUCT_WRITE");
    pub const ORDER_READ: Permission = Permission::from_static("ORDER_READ");
    pub const ORDER_WRITE: Permission = Permission::from_static("ORDER_WRITE");
    pub const INVENTORY_WRITE: Permission = Permission::from_static("INVENTORY_WRITE");
    pub const SUPPLIER_WRITE: Permission = Permission::from_static("SUPPLIER_WRITE");
    pub const REPORT_VIEW: Permission = Permission::from_static("REPORT_VIEW");
    pub const USER_MANAGE: Permission = Permission::from_static("USER_MANAGE");
}
