use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// One-time value binding an Apple identity token to this sign-in attempt.
/// Apple receives `hashed`; Firebase later receives `raw` to verify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    pub raw: String,
    pub hashed: String,
}

impl Nonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_raw(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let hashed = sha256_hex(&raw);
        Self { raw, hashed }
    }
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
