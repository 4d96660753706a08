//! Pluggable auxiliary encryption, used only to move partial key backups between guardians.
//!
//! Implementations never return errors across this boundary: any failure is logged and
//! surfaced as `None`.

use crate::*;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::warn;

/// Default RSA modulus size for the auxiliary channel.
pub const DEFAULT_AUXILIARY_KEY_SIZE: usize = 4096;

/// An auxiliary key pair, carried as opaque encoded bytes.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuxiliaryKeyPair {
    #[serde(with = "BytesHex")]
    pub secret_key: Vec<u8>,
    #[serde(with = "BytesHex")]
    pub public_key: Vec<u8>,
}

impl std::fmt::Debug for AuxiliaryKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuxiliaryKeyPair")
            .field("public_key", &hex::encode(&self.public_key))
            .finish()
    }
}

/// A guardian's published auxiliary public key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuxiliaryPublicKey {
    pub owner_id: String,
    pub sequence_order: u64,
    #[serde(with = "BytesHex")]
    pub key: Vec<u8>,
}

/// Encryption scheme for partial key backups.
pub trait AuxiliaryChannel: Send + Sync {
    fn generate_keypair(&self) -> Option<AuxiliaryKeyPair>;

    fn encrypt(&self, message: &[u8], public_key: &[u8]) -> Option<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8], secret_key: &[u8]) -> Option<Vec<u8>>;
}

/// RSA-OAEP (SHA-256) auxiliary channel. Keys are PKCS#8 / SPKI DER.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RsaAuxiliaryChannel {
    key_size: usize,
}

impl RsaAuxiliaryChannel {
    pub fn new(key_size: usize) -> Self {
        RsaAuxiliaryChannel { key_size }
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }
}

impl Default for RsaAuxiliaryChannel {
    fn default() -> Self {
        RsaAuxiliaryChannel::new(DEFAULT_AUXILIARY_KEY_SIZE)
    }
}

impl AuxiliaryChannel for RsaAuxiliaryChannel {
    fn generate_keypair(&self) -> Option<AuxiliaryKeyPair> {
        let private_key = match RsaPrivateKey::new(&mut OsRng, self.key_size) {
            Ok(key) => key,
            Err(e) => {
                warn!("rsa key generation failed: {}", e);
                return None;
            }
        };
        let public_key = RsaPublicKey::from(&private_key);

        let secret_der = private_key
            .to_pkcs8_der()
            .map_err(|e| warn!("rsa private key encoding failed: {}", e))
            .ok()?;
        let public_der = public_key
            .to_public_key_der()
            .map_err(|e| warn!("rsa public key encoding failed: {}", e))
            .ok()?;

        Some(AuxiliaryKeyPair {
            secret_key: secret_der.as_bytes().to_vec(),
            public_key: public_der.as_bytes().to_vec(),
        })
    }

    fn encrypt(&self, message: &[u8], public_key: &[u8]) -> Option<Vec<u8>> {
        let public_key = RsaPublicKey::from_public_key_der(public_key)
            .map_err(|e| warn!("rsa encrypt: invalid public key: {}", e))
            .ok()?;

        public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), message)
            .map_err(|e| warn!("rsa encrypt failed: {}", e))
            .ok()
    }

    fn decrypt(&self, ciphertext: &[u8], secret_key: &[u8]) -> Option<Vec<u8>> {
        let secret_key = RsaPrivateKey::from_pkcs8_der(secret_key)
            .map_err(|e| warn!("rsa decrypt: invalid secret key: {}", e))
            .ok()?;

        secret_key
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|e| warn!("rsa decrypt failed: {}", e))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_auxiliary_channel() {
        let channel = RsaAuxiliaryChannel::new(2048);
        let keypair = channel.generate_keypair().unwrap();

        // A backup coordinate is 64 hex characters
        let message = ElementModQ::from_u64(0xDEAD_BEEF).to_hex();
        let message = format!("{:0>64}", message);

        let ciphertext = channel
            .encrypt(message.as_bytes(), &keypair.public_key)
            .unwrap();
        assert_ne!(ciphertext, message.as_bytes());

        let plaintext = channel.decrypt(&ciphertext, &keypair.secret_key).unwrap();
        assert_eq!(plaintext, message.as_bytes());

        // Failures surface as None
        let mut tampered = ciphertext.clone();
        tampered[0] ^= 0xFF;
        assert!(channel.decrypt(&tampered, &keypair.secret_key).is_none());
        assert!(channel.decrypt(&ciphertext, b"not a key").is_none());
        assert!(channel.encrypt(message.as_bytes(), b"not a key").is_none());
    }
}
