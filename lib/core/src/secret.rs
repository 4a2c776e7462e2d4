//! Process-wide signing secrets.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};

/// Generates a 512-bit random secret, base64 encoded.
///
/// Used when no secret is configured. Every restart then invalidates all
/// outstanding tokens.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
