//! Opaque cryptographic payloads.
//!
//! Signing, sealing and key derivation happen on clients. The server only
//! stores and forwards these values.

use serde::{Deserialize, Serialize};

/// A public key in its serialized client form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pubkey(pub String);

/// Data signed by a client-held key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedData(pub String);

/// Ciphertext sealed for a specific recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedData(pub String);
