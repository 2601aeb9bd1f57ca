//! Ephemeral signaling tokens for the Polyvox relay.
//!
//! A token binds a `(roomId, peerId, name)` tuple to a short time window
//! and authorizes exactly one thing: opening a signaling socket for that
//! identity. Tokens are HMAC-SHA256 signed with the relay's secret and
//! expire after [`TOKEN_TTL_SECS`] — they authorize a single connection
//! attempt, not a session; reconnection requires reminting.
//!
//! Token format: `base64url(roomId|peerId|name|exp|hex(hmac_signature))`.

use base64::Engine;
use hmac::{Hmac, Mac};
use polyvox_types::TokenClaims;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a minted token, in seconds.
pub const TOKEN_TTL_SECS: u64 = 120;

/// Errors from minting or verifying a token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The signing secret is absent or empty. A deployment error, not a
    /// transient condition — callers should fail immediately, not retry.
    #[error("signing secret is not configured")]
    MissingSecret,

    #[error("roomId is required")]
    MissingRoomId,

    #[error("peerId is required")]
    MissingPeerId,

    /// Room and peer ids are opaque but must not contain the claim
    /// delimiter.
    #[error("id contains a reserved character")]
    InvalidId,

    /// The token is not decodable into the expected claim layout.
    #[error("malformed token")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

/// A freshly minted token and its expiry (seconds since the Unix epoch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedToken {
    pub token: String,
    pub exp: u64,
}

/// Mints and verifies ephemeral signaling tokens.
///
/// Pure function of inputs + secret + clock; holds no other state.
pub struct TokenIssuer {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenIssuer {
    /// Creates an issuer from the relay's signing secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self { secret })
    }

    /// Mints a token for `(room_id, peer_id)` valid for [`TOKEN_TTL_SECS`]
    /// from now. `name` defaults to `"Guest"`.
    pub fn mint(
        &self,
        room_id: &str,
        peer_id: &str,
        name: Option<&str>,
    ) -> Result<MintedToken, TokenError> {
        self.mint_at(room_id, peer_id, name, unix_now())
    }

    /// Mints a token with an explicit clock, for validity-window testing.
    pub fn mint_at(
        &self,
        room_id: &str,
        peer_id: &str,
        name: Option<&str>,
        now: u64,
    ) -> Result<MintedToken, TokenError> {
        if room_id.is_empty() {
            return Err(TokenError::MissingRoomId);
        }
        if peer_id.is_empty() {
            return Err(TokenError::MissingPeerId);
        }
        // The delimiter would make claims ambiguous on parse. Names may
        // contain it (they are parsed greedily); ids may not.
        if room_id.contains('|') || peer_id.contains('|') {
            return Err(TokenError::InvalidId);
        }

        let exp = now + TOKEN_TTL_SECS;
        let name = name.filter(|n| !n.is_empty()).unwrap_or("Guest");
        let payload = format!("{}|{}|{}|{}", room_id, peer_id, name, exp);
        let signature = self.sign(payload.as_bytes());

        let token_bytes = format!("{}|{}", payload, hex::encode(signature));
        let token =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes.as_bytes());

        Ok(MintedToken { token, exp })
    }

    /// Verifies a token's signature and expiry, returning its claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verifies with an explicit clock, for validity-window testing.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<TokenClaims, TokenError> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        let token_str = String::from_utf8(decoded).map_err(|_| TokenError::Malformed)?;

        // Layout: roomId|peerId|name|exp|signature_hex. The signature and
        // expiry are peeled from the right, the ids from the left; the name
        // keeps whatever is in between (it may itself contain '|').
        let (payload, sig_hex) = token_str.rsplit_once('|').ok_or(TokenError::Malformed)?;
        let (head, exp_str) = payload.rsplit_once('|').ok_or(TokenError::Malformed)?;
        let (room_id, rest) = head.split_once('|').ok_or(TokenError::Malformed)?;
        let (peer_id, name) = rest.split_once('|').ok_or(TokenError::Malformed)?;

        let provided_sig = hex::decode(sig_hex).map_err(|_| TokenError::Malformed)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::MissingSecret)?;
        mac.update(payload.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&provided_sig)
            .map_err(|_| TokenError::BadSignature)?;

        let exp: u64 = exp_str.parse().map_err(|_| TokenError::Malformed)?;
        if now > exp {
            return Err(TokenError::Expired);
        }

        Ok(TokenClaims {
            room_id: room_id.to_string(),
            peer_id: peer_id.to_string(),
            name: name.to_string(),
            exp,
        })
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        // new_from_slice accepts any key length for HMAC; the constructor
        // already rejected an empty secret.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
