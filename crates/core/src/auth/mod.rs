//! Session management

pub mod ports;
pub mod service;

pub use ports::TokenStore;
pub use service::AuthService;
