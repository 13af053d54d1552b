use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::key::ObjectKey;

type HmacSha256 = Hmac<Sha256>;

/// Issues and checks HMAC-signed, expiring object URLs.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: String,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            secret: secret.as_ref().to_vec(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Unsigned URL of `key`.
    pub fn public_url(&self, key: &ObjectKey) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// URL of `key` valid until `now + ttl_secs`.
    pub fn sign(&self, key: &ObjectKey, ttl_secs: u32, now: i64) -> String {
        let expires = now + i64::from(ttl_secs);
        format!(
            "{}?expires={expires}&signature={}",
            self.public_url(key),
            self.signature(key, expires)
        )
    }

    /// Whether `signature` is valid for `key` and has not expired at `now`.
    pub fn verify(&self, key: &ObjectKey, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        self.mac(key, expires).verify_slice(&provided).is_ok()
    }

    fn signature(&self, key: &ObjectKey, expires: i64) -> String {
        hex::encode(self.mac(key, expires).finalize().into_bytes())
    }

    fn mac(&self, key: &ObjectKey, expires: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(key.as_str().as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }
}
