pub mod manager;
pub mod service;

pub use manager::AuthenticationManager;
pub use service::{AuthenticationService, HttpAuthenticationService, TOKEN_PATH};
