//! X25519 key agreement and the MPC value-encryption layer.
//!
//! The MPC adapter encrypts amounts for the MXE (multiparty execution
//! environment) under a key derived from an X25519 shared secret and a
//! per-message 16-byte nonce, so repeated encryptions of the same value are
//! unlinkable.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use num_bigint::BigUint;
use privacykit_types::{PrivacyKitError, PrivacyKitResult};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::random_bytes;

const GCM_NONCE_SIZE: usize = 12;
const GCM_TAG_SIZE: usize = 16;

/// Key-derivation nonce attached to every encrypted value.
pub const MPC_NONCE_SIZE: usize = 16;

/// Plaintext width for general MPC values.
pub const MPC_VALUE_WIDTH: usize = 32;

/// The confidential token program encodes amounts as u64.
pub const CSPL_VALUE_WIDTH: usize = 8;

/// 32 random bytes with RFC 7748 clamping applied.
pub fn generate_secret_key() -> [u8; 32] {
    clamp_scalar(&random_bytes::<32>())
}

fn clamp_scalar(bytes: &[u8; 32]) -> [u8; 32] {
    let mut clamped = *bytes;
    clamped[0] &= 248;
    clamped[31] &= 127;
    clamped[31] |= 64;
    clamped
}

pub fn get_public_key(secret: &[u8; 32]) -> [u8; 32] {
    use x25519_dalek::{PublicKey, StaticSecret};
    let static_secret = StaticSecret::from(*secret);
    let public = PublicKey::from(&static_secret);
    *public.as_bytes()
}

pub fn get_shared_secret(secret: &[u8; 32], their_public: &[u8; 32]) -> [u8; 32] {
    use x25519_dalek::{PublicKey, StaticSecret};
    let static_secret = StaticSecret::from(*secret);
    let their_public = PublicKey::from(*their_public);
    let shared = static_secret.diffie_hellman(&their_public);
    *shared.as_bytes()
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct X25519KeyPair {
    secret: [u8; 32],
    public: [u8; 32],
}

impl X25519KeyPair {
    pub fn generate() -> Self {
        let secret = generate_secret_key();
        let public = get_public_key(&secret);
        Self { secret, public }
    }

    pub fn from_secret(secret: [u8; 32]) -> Self {
        let clamped = clamp_scalar(&secret);
        let public = get_public_key(&clamped);
        Self {
            secret: clamped,
            public,
        }
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public
    }

    pub fn diffie_hellman(&self, their_public: &[u8; 32]) -> [u8; 32] {
        get_shared_secret(&self.secret, their_public)
    }
}

/// Little-endian fixed-width integer encoding. Fails when the value does not
/// fit in `width` bytes.
pub fn serialize_le(value: &BigUint, width: usize) -> PrivacyKitResult<Vec<u8>> {
    let mut bytes = value.to_bytes_le();
    if bytes.len() > width {
        return Err(PrivacyKitError::InvalidInput(format!(
            "value needs {} bytes, width is {}",
            bytes.len(),
            width
        )));
    }
    bytes.resize(width, 0);
    Ok(bytes)
}

/// Exact inverse of `serialize_le`.
pub fn deserialize_le(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_le(bytes)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedValue {
    /// GCM nonce prefix followed by ciphertext and tag.
    pub ciphertext: Vec<u8>,
    /// Key-derivation nonce; fresh per encryption.
    pub nonce: [u8; MPC_NONCE_SIZE],
}

impl EncryptedValue {
    /// Instruction wire form: nonce followed by the ciphertext.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MPC_NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}

fn derive_value_key(shared_secret: &[u8; 32], nonce: &[u8; MPC_NONCE_SIZE]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(shared_secret);
    hasher.update(nonce);
    hasher.finalize().into()
}

fn aead_encrypt(key: &[u8; 32], plaintext: &[u8]) -> PrivacyKitResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| PrivacyKitError::InvalidInput(e.to_string()))?;

    let nonce_bytes = random_bytes::<GCM_NONCE_SIZE>();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| PrivacyKitError::InvalidInput(format!("encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

fn aead_decrypt(key: &[u8; 32], encrypted: &[u8]) -> PrivacyKitResult<Vec<u8>> {
    if encrypted.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
        return Err(PrivacyKitError::InvalidFormat(
            "encrypted value too short".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| PrivacyKitError::InvalidInput(e.to_string()))?;

    let nonce = Nonce::from_slice(&encrypted[..GCM_NONCE_SIZE]);
    cipher
        .decrypt(nonce, &encrypted[GCM_NONCE_SIZE..])
        .map_err(|e| PrivacyKitError::InvalidFormat(format!("decryption failed: {}", e)))
}

/// Encrypts numeric values for an MXE peer identified by its X25519 key.
pub struct ArciumEncryption {
    keypair: X25519KeyPair,
    mxe_public_key: [u8; 32],
}

impl ArciumEncryption {
    pub fn new(mxe_public_key: [u8; 32]) -> Self {
        Self {
            keypair: X25519KeyPair::generate(),
            mxe_public_key,
        }
    }

    pub fn with_keypair(keypair: X25519KeyPair, mxe_public_key: [u8; 32]) -> Self {
        Self {
            keypair,
            mxe_public_key,
        }
    }

    /// Our ephemeral public key; the MXE derives the same shared secret from it.
    pub fn public_key(&self) -> &[u8; 32] {
        self.keypair.public_key()
    }

    pub fn shared_secret(&self) -> [u8; 32] {
        self.keypair.diffie_hellman(&self.mxe_public_key)
    }

    pub fn encrypt(&self, value: &BigUint) -> PrivacyKitResult<EncryptedValue> {
        self.encrypt_width(value, MPC_VALUE_WIDTH)
    }

    /// Encrypt with the confidential token program's fixed u64 width.
    pub fn encrypt_for_cspl(&self, value: &BigUint) -> PrivacyKitResult<EncryptedValue> {
        self.encrypt_width(value, CSPL_VALUE_WIDTH)
    }

    fn encrypt_width(&self, value: &BigUint, width: usize) -> PrivacyKitResult<EncryptedValue> {
        let plaintext = serialize_le(value, width)?;
        let nonce = random_bytes::<MPC_NONCE_SIZE>();
        let key = derive_value_key(&self.shared_secret(), &nonce);
        let ciphertext = aead_encrypt(&key, &plaintext)?;
        Ok(EncryptedValue { ciphertext, nonce })
    }

    pub fn decrypt(&self, value: &EncryptedValue) -> PrivacyKitResult<BigUint> {
        decrypt_value(&self.shared_secret(), value)
    }
}

/// Recover a value given the shared secret; the MXE side of `encrypt`.
pub fn decrypt_value(
    shared_secret: &[u8; 32],
    value: &EncryptedValue,
) -> PrivacyKitResult<BigUint> {
    let key = derive_value_key(shared_secret, &value.nonce);
    let plaintext = aead_decrypt(&key, &value.ciphertext)?;
    Ok(deserialize_le(&plaintext))
}
