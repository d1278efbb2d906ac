//! Recovery of the wallet behind an Ethereum `personal_sign` signature.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::models::Address;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Signature is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("Signature must be 65 bytes, got {0}")]
    Length(usize),
    #[error("Invalid signature recovery id {0}")]
    RecoveryId(u8),
    #[error("Malformed signature: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),
}

fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Digest a wallet signs for `personal_sign` (EIP-191 version `0x45`).
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(prefixed.as_bytes())
}

/// Last 20 bytes of the Keccak-256 of the uncompressed public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

/// Recovers the address that produced `signature` (hex `r || s || v`) over `message`.
pub fn recover_signer(message: &str, signature: &str) -> Result<Address, SignatureError> {
    let bytes = hex::decode(signature.trim().trim_start_matches("0x"))?;
    if bytes.len() != 65 {
        return Err(SignatureError::Length(bytes.len()));
    }
    // Wallets send v as 27/28; raw recovery ids are 0/1.
    let v = bytes[64];
    let recovery_id = RecoveryId::from_byte(if v >= 27 { v - 27 } else { v }).ok_or(SignatureError::RecoveryId(v))?;
    let signature = Signature::from_slice(&bytes[..64])?;
    let key = VerifyingKey::recover_from_prehash(&personal_message_hash(message), &signature, recovery_id)?;
    Ok(address_of(&key))
}

#[cfg(test)]
pub(crate) fn sign_personal(key: &k256::ecdsa::SigningKey, message: &str) -> String {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&personal_message_hash(message))
        .unwrap();
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn key(last: u8) -> SigningKey {
        let mut secret = [0u8; 32];
        secret[31] = last;
        SigningKey::from_slice(&secret).unwrap()
    }

    #[test]
    fn derives_known_address_for_key_one() {
        assert_eq!(
            address_of(key(1).verifying_key()).as_str(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn recovers_signer_of_personal_message() {
        let signer = key(9);
        let signature = sign_personal(&signer, "Nonce: 42");
        let recovered = recover_signer("Nonce: 42", &signature).unwrap();
        assert_eq!(recovered, address_of(signer.verifying_key()));

        let other = recover_signer("Nonce: 43", &signature).unwrap();
        assert_ne!(other, recovered);
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert!(matches!(recover_signer("m", ""), Err(SignatureError::Length(0))));
        assert!(matches!(recover_signer("m", "0xzz"), Err(SignatureError::Hex(_))));
        let mut bytes = vec![1u8; 64];
        bytes.push(31);
        assert!(matches!(
            recover_signer("m", &hex::encode(bytes)),
            Err(SignatureError::RecoveryId(31))
        ));
    }
}
