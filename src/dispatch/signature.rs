use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Lowercase-hex HMAC-SHA256 over the exact request body bytes. Subscribers
/// recompute this over the body they received to verify the sender.
#[must_use]
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
