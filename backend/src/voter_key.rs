use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;

/// Derives the opaque voter key that vote records are stored under.
///
/// The key is an HMAC-SHA256 of the user id under a server secret, so a
/// reader of the vote table cannot map a vote back to a user without the
/// secret, and cannot compute a valid key for a user id either.
#[derive(Clone)]
pub struct VoterKeyHasher {
    key: hmac::Key,
}

impl VoterKeyHasher {
    pub fn new(secret: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        }
    }

    pub fn voter_key(&self, user_id: &str) -> String {
        let tag = hmac::sign(&self.key, user_id.as_bytes());
        URL_SAFE_NO_PAD.encode(tag.as_ref())
    }
}

impl std::fmt::Debug for VoterKeyHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VoterKeyHasher { .. }")
    }
}
