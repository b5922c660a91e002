//! Capability Tokens
//!
//! A capability token scopes a request to exactly one logical database:
//!
//! ```text
//! <dbName>.<nonce>.<expiryMillis>.<signature>
//! ```
//!
//! The signature is HMAC-SHA256 over `dbName.nonce.expiryMillis`, base64url
//! without padding. Database names never contain `.`, so the four-way split
//! is unambiguous.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use tessera_core::{validate_db_name, EpochMillis, ProvisionError, TokenRejection};

type HmacSha256 = Hmac<Sha256>;

/// Placeholder used when no secret is configured. Refused in production.
pub const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

const NONCE_BYTES: usize = 16;

// ============================================================================
// CLOCK
// ============================================================================

/// Time source for minting and expiry checks.
pub trait TokenClock: Send + Sync {
    /// Current time as Unix epoch milliseconds.
    fn now_millis(&self) -> EpochMillis;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TokenClock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        tessera_core::now_millis()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub EpochMillis);

impl TokenClock for FixedClock {
    fn now_millis(&self) -> EpochMillis {
        self.0
    }
}

// ============================================================================
// SIGNING SECRET
// ============================================================================

/// HMAC signing secret that never shows up in logs or debug output.
#[derive(Clone)]
pub struct SigningSecret(SecretString);

impl SigningSecret {
    /// Wrap a secret.
    ///
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: impl Into<String>) -> Result<Self, ProvisionError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ProvisionError::Token {
                reason: "signing secret is empty".to_string(),
            });
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// The development placeholder secret.
    pub fn insecure_default() -> Self {
        Self(SecretString::new(INSECURE_DEFAULT_SECRET.into()))
    }

    /// Expose the secret value (only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Get the length of the secret without exposing it.
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }

    fn mac(&self) -> Result<HmacSha256, ProvisionError> {
        HmacSha256::new_from_slice(self.expose().as_bytes()).map_err(|e| ProvisionError::Token {
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// MINT / VALIDATE
// ============================================================================

fn signing_input(db_name: &str, nonce: &str, expiry: &str) -> String {
    format!("{}.{}.{}", db_name, nonce, expiry)
}

/// Mint a token for `db_name` that expires `ttl_ms` after `now_ms`.
pub fn mint_at(
    db_name: &str,
    secret: &SigningSecret,
    ttl_ms: i64,
    now_ms: EpochMillis,
) -> Result<String, ProvisionError> {
    validate_db_name(db_name).map_err(|e| ProvisionError::Token {
        reason: e.to_string(),
    })?;
    let nonce_bytes: [u8; NONCE_BYTES] = rand::random();
    let nonce = URL_SAFE_NO_PAD.encode(nonce_bytes);
    let expiry = now_ms.saturating_add(ttl_ms).to_string();
    let payload = signing_input(db_name, &nonce, &expiry);

    let mut mac = secret.mac()?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload, signature))
}

/// Mint a token against the system clock.
pub fn mint(db_name: &str, secret: &SigningSecret, ttl_ms: i64) -> Result<String, ProvisionError> {
    mint_at(db_name, secret, ttl_ms, SystemClock.now_millis())
}

/// Check `token` for `db_name` at `now_ms`.
///
/// Checks run in a fixed order: part count, database name, expiry, then
/// signature. An expiry that does not parse is `malformed`.
pub fn validate_at(
    db_name: &str,
    token: &str,
    secret: &SigningSecret,
    now_ms: EpochMillis,
) -> Result<(), TokenRejection> {
    let parts: Vec<&str> = token.split('.').collect();
    let [token_db, nonce, expiry, signature] = parts.as_slice() else {
        return Err(TokenRejection::Malformed);
    };

    if *token_db != db_name {
        return Err(TokenRejection::DbnameMismatch);
    }

    let expires_at: EpochMillis = expiry.parse().map_err(|_| TokenRejection::Malformed)?;
    if expires_at < now_ms {
        return Err(TokenRejection::Expired);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenRejection::BadSig)?;
    let mut mac = secret.mac().map_err(|_| TokenRejection::BadSig)?;
    mac.update(signing_input(token_db, nonce, expiry).as_bytes());
    // Constant-time comparison.
    mac.verify_slice(&signature)
        .map_err(|_| TokenRejection::BadSig)
}

/// Check a token against the system clock.
pub fn validate(db_name: &str, token: &str, secret: &SigningSecret) -> Result<(), TokenRejection> {
    validate_at(db_name, token, secret, SystemClock.now_millis())
}

// ============================================================================
// SERVICE
// ============================================================================

/// Secret plus clock, shared by the gateway and the orchestrator.
#[derive(Clone)]
pub struct TokenService {
    secret: SigningSecret,
    clock: Arc<dyn TokenClock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &self.secret)
            .field("clock", &"<TokenClock>")
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: SigningSecret) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: SigningSecret, clock: Arc<dyn TokenClock>) -> Self {
        Self { secret, clock }
    }

    pub fn secret(&self) -> &SigningSecret {
        &self.secret
    }

    pub fn mint(&self, db_name: &str, ttl_ms: i64) -> Result<String, ProvisionError> {
        mint_at(db_name, &self.secret, ttl_ms, self.clock.now_millis())
    }

    pub fn validate(&self, db_name: &str, token: &str) -> Result<(), TokenRejection> {
        validate_at(db_name, token, &self.secret, self.clock.now_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tessera_test_utils::generators::{arb_db_name, arb_secret, arb_ttl_ms};

    const NOW: EpochMillis = 1_704_067_200_000;

    const BASE64URL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    fn secret() -> SigningSecret {
        SigningSecret::new("test-secret-that-is-long-enough-for-hmac").unwrap()
    }

    #[test]
    fn test_token_has_four_parts_and_names_the_database() {
        let token = mint_at("tenant-42", &secret(), 60_000, NOW).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "tenant-42");
        assert_eq!(parts[2], (NOW + 60_000).to_string());
        assert!(!parts[1].contains('='));
    }

    #[test]
    fn test_mint_refuses_names_that_break_the_split() {
        for name in ["tenant.1", "", "a b"] {
            let err = mint_at(name, &secret(), 60_000, NOW).unwrap_err();
            assert!(matches!(err, ProvisionError::Token { .. }), "{name:?}: {err}");
        }
    }

    #[test]
    fn test_nonces_differ_between_mints() {
        let a = mint_at("tenant-1", &secret(), 1_000, NOW).unwrap();
        let b = mint_at("tenant-1", &secret(), 1_000, NOW).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejection_reasons() {
        let secret = secret();
        let token = mint_at("tenant-1", &secret, 1_000, NOW).unwrap();

        assert_eq!(
            validate_at("tenant-1", "a.b.c", &secret, NOW),
            Err(TokenRejection::Malformed)
        );
        assert_eq!(
            validate_at("tenant-2", &token, &secret, NOW),
            Err(TokenRejection::DbnameMismatch)
        );
        assert_eq!(
            validate_at("tenant-1", &token, &secret, NOW + 1_001),
            Err(TokenRejection::Expired)
        );
        assert_eq!(
            validate_at("tenant-1", "tenant-1.n.soon.sig", &secret, NOW),
            Err(TokenRejection::Malformed)
        );

        let mut dotted = token.clone();
        dotted.pop();
        dotted.push('.');
        assert_eq!(
            validate_at("tenant-1", &dotted, &secret, NOW),
            Err(TokenRejection::Malformed)
        );

        let other = SigningSecret::new("another-secret").unwrap();
        assert_eq!(
            validate_at("tenant-1", &token, &other, NOW),
            Err(TokenRejection::BadSig)
        );
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let secret = secret();
        let token = mint_at("tenant-1", &secret, 1_000, NOW).unwrap();
        assert_eq!(validate_at("tenant-1", &token, &secret, NOW + 1_000), Ok(()));
    }

    #[test]
    fn test_name_is_checked_before_expiry() {
        let secret = secret();
        let token = mint_at("tenant-1", &secret, 1_000, NOW).unwrap();
        assert_eq!(
            validate_at("tenant-2", &token, &secret, NOW + 10_000),
            Err(TokenRejection::DbnameMismatch)
        );
    }

    #[test]
    fn test_service_uses_injected_clock() {
        let minted = TokenService::with_clock(secret(), Arc::new(FixedClock(NOW)));
        let token = minted.mint("tenant-1", 5_000).unwrap();

        let later = TokenService::with_clock(secret(), Arc::new(FixedClock(NOW + 5_001)));
        assert_eq!(minted.validate("tenant-1", &token), Ok(()));
        assert_eq!(later.validate("tenant-1", &token), Err(TokenRejection::Expired));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = SigningSecret::new("hunter2-hunter2").unwrap();
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));

        let service = TokenService::new(secret);
        assert!(!format!("{:?}", service).contains("hunter2"));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(SigningSecret::new("").is_err());
        assert!(SigningSecret::new(INSECURE_DEFAULT_SECRET)
            .unwrap()
            .is_insecure_default());
    }

    proptest! {
        #[test]
        fn prop_minted_token_validates_until_expiry(
            db_name in arb_db_name(),
            raw_secret in arb_secret(),
            ttl in arb_ttl_ms(),
        ) {
            let secret = SigningSecret::new(raw_secret).unwrap();
            let token = mint_at(&db_name, &secret, ttl, NOW).unwrap();

            prop_assert_eq!(validate_at(&db_name, &token, &secret, NOW), Ok(()));
            prop_assert_eq!(
                validate_at(&db_name, &token, &secret, NOW + ttl + 1),
                Err(TokenRejection::Expired)
            );
        }

        #[test]
        fn prop_any_signature_flip_is_bad_sig(
            db_name in arb_db_name(),
            raw_secret in arb_secret(),
            position in any::<prop::sample::Index>(),
            replacement in any::<prop::sample::Index>(),
        ) {
            let secret = SigningSecret::new(raw_secret).unwrap();
            let token = mint_at(&db_name, &secret, 60_000, NOW).unwrap();

            let split = token.rfind('.').unwrap() + 1;
            let mut bytes = token.into_bytes();
            let i = split + position.index(bytes.len() - split);
            let original = bytes[i];
            // Substitutes stay inside the base64url alphabet; a `.` would
            // change the part count and come back `malformed` instead.
            let mut c = BASE64URL[replacement.index(BASE64URL.len())];
            if c == original {
                c = if original == b'A' { b'B' } else { b'A' };
            }
            bytes[i] = c;
            let tampered = String::from_utf8(bytes).unwrap();

            prop_assert_eq!(
                validate_at(&db_name, &tampered, &secret, NOW),
                Err(TokenRejection::BadSig)
            );
        }
    }
}
