//! Razorpay signature checks.
//!
//! Checkout callbacks are signed over `order_id|payment_id` with the key
//! secret. Webhooks are signed over the raw request body with the webhook
//! secret. Both are lowercase hex HMAC-SHA256.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature missing")]
    Missing,

    #[error("signature is not valid hex")]
    Malformed,

    #[error("signature mismatch")]
    Mismatch,

    #[error("signing key rejected")]
    Key,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    key_secret: Vec<u8>,
    webhook_secret: Vec<u8>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(key_secret: impl Into<Vec<u8>>, webhook_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn verify_checkout(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        verify(
            &self.key_secret,
            &[order_id.as_bytes(), b"|", payment_id.as_bytes()],
            signature,
        )
    }

    pub fn verify_webhook(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let signature = signature.ok_or(SignatureError::Missing)?;
        verify(&self.webhook_secret, &[body], signature)
    }
}

/// Hex HMAC-SHA256 of the concatenated `parts`.
pub fn sign(secret: &[u8], parts: &[&[u8]]) -> Result<String, SignatureError> {
    Ok(hex::encode(mac_over(secret, parts)?.finalize().into_bytes()))
}

fn mac_over(secret: &[u8], parts: &[&[u8]]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Key)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

fn verify(secret: &[u8], parts: &[&[u8]], signature: &str) -> Result<(), SignatureError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(SignatureError::Missing);
    }
    let expected = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;
    // verify_slice compares in constant time.
    mac_over(secret, parts)?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
