use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Query parameter carrying the signature.
pub const SIGNATURE_PARAM: &str = "signature";
/// Query parameter carrying the expiry as a Unix timestamp.
pub const EXPIRES_PARAM: &str = "expires";

/// HMAC-SHA256 of `message` under `key`, as 64 lowercase hex characters.
pub fn compute_signature(key: &[u8], message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Compare two signature strings in constant time.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
