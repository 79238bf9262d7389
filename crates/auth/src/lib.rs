//! `stockgate-auth`: stateless, fail-closed credential layer.
//!
//! This crate is intentionally decoupled from HTTP and storage: principals
//! come in through [`PrincipalLookup`], requests are described by method and
//! path only.

pub mod authorize;
pub mod hasher;
pub mod login;
pub mod lookup;
pub mod permissions;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod rules;
pub mod token;

pub use authorize::{authorize, evaluate, AuthzDecision, DenyReason};
pub use hasher::{CredentialHasher, HashError, HasherParams};
pub use login::{AuthError, LoginService};
pub use lookup::{LookupError, PrincipalLookup, PrincipalRecord, RoleGrant};
pub use permissions::Permission;
pub use principal::Principal;
pub use resolver::{PrincipalResolver, ResolveError};
pub use roles::Role;
pub use rules::{
    AuthorityExpression, HttpMethod, PathPattern, RouteRule, RouteRuleSpec, RouteTable,
    RouteTableSpec, RuleError,
};
pub use token::{
    IssueError, IssuedToken, KeyError, SigningKey, TokenCodec, TokenError, VerifiedToken,
    DEFAULT_TOKEN_TTL_SECS, MIN_SIGNING_KEY_LEN,
};
