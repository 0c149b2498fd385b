//! In-process adapters: a static credential table and the built-in
//! trusted-root acknowledgement action.

#[cfg(feature = "static-auth")]
pub mod static_auth;
#[cfg(feature = "trusted-root")]
pub mod update_trusted_root;

#[cfg(feature = "static-auth")]
pub use static_auth::StaticAuthenticator;
#[cfg(feature = "trusted-root")]
pub use update_trusted_root::{UpdateTrustedRoot, UpdateTrustedRootPayload, UPDATE_TRUSTED_ROOT};
