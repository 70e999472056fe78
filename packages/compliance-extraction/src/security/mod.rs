//! Credential handling.

mod credentials;

pub use credentials::{CompletionCredentials, SecretString, DEFAULT_BASE_URL, DEFAULT_MODEL};
