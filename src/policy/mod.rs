//! Role-based permission policy.
//!
//! Maps WordPress-style roles to the permissions they grant. Handlers only
//! ever ask a [`Principal`](crate::auth::Principal) whether it holds a
//! permission; the role map is consulted once, when the principal is built.

pub mod rbac;

pub use rbac::RoleMap;
