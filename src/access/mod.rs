//! Access control: per-business permission levels and the capabilities they grant
//!
//! Every request resolves a fresh [`PermissionLevel`] for the acting user and the
//! target business; nothing here is cached between requests.

pub mod capability;
pub mod permission;
pub mod resolver;

pub use capability::Capabilities;
pub use permission::{AccessDescriptor, PermissionLevel};
pub use resolver::{AccessLookup, AccessResolver, UserLookup};
