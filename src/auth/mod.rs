// Authentication module - credential persistence and token lifecycle

pub mod lifecycle;
pub mod store;
pub mod types;

pub use lifecycle::{OAuthConfig, TokenLifecycle};
pub use store::CredentialStore;
pub use types::{Credential, LifecycleState, TokenResponse};
