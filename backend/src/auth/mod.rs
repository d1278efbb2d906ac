use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Address, AddressError};

mod challenge;
pub mod signature;

pub use challenge::{challenge_message, LoginChallenges, CHALLENGE_TTL};
pub use signature::SignatureError;

const SESSION_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid or expired token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("System clock is before the Unix epoch")]
    Clock,
    #[error("No login challenge outstanding for this wallet")]
    NoChallenge,
    #[error("Login challenge expired")]
    Expired,
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("Challenge was signed by {0}")]
    SignerMismatch(Address),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // Wallet address
    exp: usize,
}

/// Issues a session token whose subject is the connected wallet.
pub fn create_token(wallet: &Address, jwt_secret: &str) -> Result<String, AuthError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AuthError::Clock)?
        .as_secs();
    let claims = Claims {
        sub: wallet.to_string(),
        exp: (now + SESSION_TTL_SECS) as usize,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(jwt_secret.as_bytes()))?;
    Ok(token)
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Address, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(Address::parse(&token_data.claims.sub)?)
}
