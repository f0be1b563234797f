use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::email::EmailError;

type HmacSha256 = Hmac<Sha256>;

const ONE_YEAR_SECS: i64 = 365 * 24 * 60 * 60;

/// Claims carried by an unsubscribe link. `exp` is Unix epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnsubscribeClaims {
    pub ws: String,
    #[serde(rename = "contactId")]
    pub contact_id: String,
    pub exp: i64,
}

impl UnsubscribeClaims {
    pub fn new(workspace_id: &str, contact_id: &str) -> Self {
        Self {
            ws: workspace_id.to_string(),
            contact_id: contact_id.to_string(),
            exp: chrono::Utc::now().timestamp() + ONE_YEAR_SECS,
        }
    }
}

/// Token layout: `base64url(payload) "." base64url(HMAC-SHA256(payloadB64))`.
/// The MAC is computed over the encoded payload, not the raw JSON.
pub fn sign(claims: &UnsubscribeClaims, key: &str) -> Result<String, EmailError> {
    let payload = serde_json::to_vec(claims)?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| EmailError::token(format!("invalid signing key: {e}")))?;
    mac.update(payload_b64.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{payload_b64}.{signature}"))
}

/// Verify a token: recompute the MAC over the payload half and check the
/// expiry. Returns the claims only when both hold.
pub fn verify(token: &str, key: &str) -> Result<UnsubscribeClaims, EmailError> {
    let (payload_b64, signature_b64) = token
        .split_once('.')
        .ok_or_else(|| EmailError::token("malformed token"))?;

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| EmailError::token(format!("invalid signing key: {e}")))?;
    mac.update(payload_b64.as_bytes());
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| EmailError::token("malformed signature"))?;
    mac.verify_slice(&signature)
        .map_err(|_| EmailError::token("signature mismatch"))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| EmailError::token("malformed payload"))?;
    let claims: UnsubscribeClaims = serde_json::from_slice(&payload)?;

    if claims.exp <= chrono::Utc::now().timestamp() {
        return Err(EmailError::token("token expired"));
    }
    Ok(claims)
}
