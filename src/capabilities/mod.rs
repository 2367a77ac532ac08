//! # Capability Registry
//!
//! A capability is one named operation the broker exposes to tool clients:
//! `search_posts`, `create_order`, `recommend_products` and so on. This
//! module holds the declarations only. The code that runs a capability lives
//! in [`crate::handlers`] and is bound by name when the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) is built.
//!
//! ## Which capabilities exist
//!
//! Two filters decide whether a registered capability is listed and
//! invocable for a deployment:
//!
//! 1. The operator's [`EnabledTools`] set (empty = everything enabled)
//! 2. The capability's [`Availability`] predicate against the
//!    [`PlatformDescriptor`](crate::platform::PlatformDescriptor)
//!
//! Both are evaluated through a [`ListContext`].

pub mod capability;
pub mod catalog;
pub mod filter;
pub mod registry;

pub use capability::{
    Availability, Capability, FieldSpec, FieldType, InputSchema, SchemaError, Subsystem,
    ToolDescriptor,
};
pub use catalog::{builtin_capabilities, COMMERCE_TOOLS};
pub use filter::EnabledTools;
pub use registry::{CapabilityRegistry, Invocability, ListContext, RegistryError};
