//! Server-side registration lifecycle
pub mod options;
pub mod registration;

pub use options::{RegistrationConfig, ServerOptions};
pub use registration::{build_service_descriptor, RegistrationManager};
