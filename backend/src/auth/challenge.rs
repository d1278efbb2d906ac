//! One-shot sign-in nonces a wallet must sign before a session is issued.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::signature::recover_signer;
use super::AuthError;
use crate::models::Address;

pub const CHALLENGE_TTL: Duration = Duration::from_secs(5 * 60);

pub fn challenge_message(wallet: &Address, nonce: &str) -> String {
    format!("Sign in to the estate marketplace\nWallet: {}\nNonce: {}", wallet, nonce)
}

struct Challenge {
    nonce: String,
    issued: Instant,
}

/// Outstanding challenges keyed by wallet. Issuing again replaces the old nonce.
pub struct LoginChallenges {
    ttl: Duration,
    pending: Mutex<HashMap<Address, Challenge>>,
}

impl LoginChallenges {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the message `wallet` has to sign.
    pub fn issue(&self, wallet: &Address) -> String {
        let nonce = uuid::Uuid::new_v4().to_string();
        let message = challenge_message(wallet, &nonce);
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|_, c| c.issued.elapsed() < self.ttl);
        pending.insert(
            wallet.clone(),
            Challenge {
                nonce,
                issued: Instant::now(),
            },
        );
        log::debug!("Issued login challenge for {}", wallet);
        message
    }

    /// Consumes `wallet`'s challenge and checks `signature` was made by `wallet`.
    pub fn redeem(&self, wallet: &Address, signature: &str) -> Result<(), AuthError> {
        let challenge = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(wallet)
            .ok_or(AuthError::NoChallenge)?;
        if challenge.issued.elapsed() >= self.ttl {
            return Err(AuthError::Expired);
        }
        let signer = recover_signer(&challenge_message(wallet, &challenge.nonce), signature)?;
        if &signer != wallet {
            log::warn!("Login for {} signed by {}", wallet, signer);
            return Err(AuthError::SignerMismatch(signer));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::{address_of, sign_personal};
    use k256::ecdsa::SigningKey;

    fn key(byte: u8) -> SigningKey {
        SigningKey::from_slice(&[byte; 32]).unwrap()
    }

    #[test]
    fn signed_challenge_is_redeemed_once() {
        let challenges = LoginChallenges::new(CHALLENGE_TTL);
        let wallet_key = key(3);
        let wallet = address_of(wallet_key.verifying_key());

        let signature = sign_personal(&wallet_key, &challenges.issue(&wallet));
        challenges.redeem(&wallet, &signature).unwrap();
        assert!(matches!(challenges.redeem(&wallet, &signature), Err(AuthError::NoChallenge)));
    }

    #[test]
    fn other_signer_is_rejected() {
        let challenges = LoginChallenges::new(CHALLENGE_TTL);
        let wallet = address_of(key(3).verifying_key());
        let signature = sign_personal(&key(4), &challenges.issue(&wallet));
        assert!(matches!(
            challenges.redeem(&wallet, &signature),
            Err(AuthError::SignerMismatch(_))
        ));
    }

    #[test]
    fn reissue_invalidates_previous_nonce() {
        let challenges = LoginChallenges::new(CHALLENGE_TTL);
        let wallet_key = key(5);
        let wallet = address_of(wallet_key.verifying_key());
        let stale = sign_personal(&wallet_key, &challenges.issue(&wallet));
        challenges.issue(&wallet);
        assert!(matches!(
            challenges.redeem(&wallet, &stale),
            Err(AuthError::SignerMismatch(_))
        ));
    }

    #[test]
    fn expired_challenge_is_rejected() {
        let challenges = LoginChallenges::new(Duration::ZERO);
        let wallet_key = key(6);
        let wallet = address_of(wallet_key.verifying_key());
        let signature = sign_personal(&wallet_key, &challenges.issue(&wallet));
        assert!(matches!(challenges.redeem(&wallet, &signature), Err(AuthError::Expired)));
    }
}
