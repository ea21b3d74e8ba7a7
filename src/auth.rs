//! Credential sources and the access-token lifecycle manager.
//!
//! [`CredentialSource`] is the seam to whatever mints tokens (OAuth refresh-token grants,
//! static tokens for emulators, custom providers). [`CredentialManager`] owns the token the
//! client actually sends: it acquires one during construction, republishes it atomically so
//! request paths never block, and re-checks it on a fixed background tick.

pub mod credential;
pub mod manager;
pub mod secret;

#[cfg(feature = "reqwest")] mod authorized_user;

#[cfg(feature = "reqwest")] pub use authorized_user::*;
pub use credential::*;
pub use manager::*;
pub use secret::*;
