//! Server module for building HTTP servers from resource views
//!
//! This module provides:
//! - `ResourceView`, the declarative generator of CRUD routes
//! - `ViewRegistry`, which collects views over different resource types
//! - Login/refresh token routes
//! - `ServerBuilder`, which wires everything into one axum `Router`

pub mod builder;
pub mod guard;
pub mod principals;
pub mod registry;
pub mod token_routes;
pub mod view;

pub use builder::ServerBuilder;
pub use guard::Caller;
pub use principals::principal_view;
pub use registry::{ViewContext, ViewDescriptor, ViewRegistry};
pub use token_routes::{TokenPair, token_routes};
pub use view::{Call, Payload, ResourceView};
