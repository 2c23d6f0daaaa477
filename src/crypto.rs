//! Cryptographic utilities for Oracle authentication
//!
//! This module provides the key exchange maths behind O3LOGON (verifier type
//! 2361) and O5LOGON (verifier type 6949):
//! - password key derivation (DES chain for 2361, SHA-1 for 6949)
//! - session key decryption/encryption with AES-CBC and a zero IV
//! - the MD5 key hash and password encryption
//! - verification of the server response
//!
//! Wire handling of the two logon phases lives in `messages::auth`.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::cipher::block_padding::NoPadding;
use md5::{Digest, Md5};
use rand::RngCore;
use sha1::Sha1;

use crate::constants::verifier_type;
use crate::error::{Error, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type DesCbcEnc = cbc::Encryptor<des::Des>;

/// AES block size
const BLOCK_SIZE: usize = 16;

/// Zero IV used for Oracle's AES-CBC encryption
const ZERO_IV: [u8; 16] = [0u8; 16];

/// Fixed DES key starting the O3LOGON key chain
const O3LOGON_DES_KEY: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];

/// Plaintext tail of a valid `AUTH_SVR_RESPONSE`
const SERVER_TO_CLIENT: &[u8; 16] = b"SERVER_TO_CLIENT";

/// Append PKCS5 padding (always at least one byte)
pub fn pkcs5_pad(data: &mut Vec<u8>) {
    let padding = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    data.extend(std::iter::repeat(padding as u8).take(padding));
}

/// Encrypt block-aligned data with AES-CBC and a zero IV
///
/// The AES variant follows the key length (16, 24 or 32 bytes).
pub fn aes_cbc_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(Error::protocol(format!(
            "AES input must be a multiple of 16 bytes, got {}",
            data.len()
        )));
    }
    let mut buffer = data.to_vec();
    let len = buffer.len();
    let iv = &ZERO_IV.into();
    let result = match key.len() {
        16 => Aes128CbcEnc::new(key.into(), iv)
            .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
            .map(|c| c.len()),
        24 => Aes192CbcEnc::new(key.into(), iv)
            .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
            .map(|c| c.len()),
        32 => Aes256CbcEnc::new(key.into(), iv)
            .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
            .map(|c| c.len()),
        other => return Err(Error::protocol(format!("invalid AES key length {}", other))),
    };
    result.map_err(|e| Error::protocol(format!("AES encryption failed: {}", e)))?;
    Ok(buffer)
}

/// Decrypt block-aligned data with AES-CBC and a zero IV
pub fn aes_cbc_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(Error::protocol(format!(
            "Ciphertext length must be a multiple of 16 bytes, got {}",
            data.len()
        )));
    }
    let mut buffer = data.to_vec();
    let iv = &ZERO_IV.into();
    let result = match key.len() {
        16 => Aes128CbcDec::new(key.into(), iv)
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map(|p| p.len()),
        24 => Aes192CbcDec::new(key.into(), iv)
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map(|p| p.len()),
        32 => Aes256CbcDec::new(key.into(), iv)
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map(|p| p.len()),
        other => return Err(Error::protocol(format!("invalid AES key length {}", other))),
    };
    result.map_err(|e| Error::protocol(format!("AES decryption failed: {}", e)))?;
    Ok(buffer)
}

/// Decrypt a hex session key, stripping the pad only when it is consistent
pub fn decrypt_session_key(padding: bool, key: &[u8], session_key: &str) -> Result<Vec<u8>> {
    let encrypted = hex::decode(session_key)
        .map_err(|e| Error::protocol(format!("invalid session key hex: {}", e)))?;
    let mut output = aes_cbc_decrypt(key, &encrypted)?;
    if padding {
        let num = output[output.len() - 1] as usize;
        if num < BLOCK_SIZE && output[output.len() - num..].iter().all(|&b| b as usize == num) {
            output.truncate(output.len() - num);
        }
    }
    Ok(output)
}

/// Data without its PKCS5 pad, `None` when the pad is malformed
fn strip_pkcs5(data: &[u8]) -> Option<&[u8]> {
    let num = *data.last()? as usize;
    if num == 0 || num > BLOCK_SIZE || num > data.len() {
        return None;
    }
    let (body, pad) = data.split_at(data.len() - num);
    pad.iter().all(|&b| b as usize == num).then_some(body)
}

/// Encrypt a session key and return it as uppercase hex
pub fn encrypt_session_key(padding: bool, key: &[u8], session_key: &[u8]) -> Result<String> {
    let mut data = session_key.to_vec();
    if padding {
        pkcs5_pad(&mut data);
    }
    Ok(hex::encode_upper(aes_cbc_encrypt(key, &data)?))
}

/// Encrypt the password behind 16 random bytes with the key hash
pub fn encrypt_password(password: &[u8], key_hash: &[u8]) -> Result<String> {
    let mut data = vec![0u8; 16];
    rand::thread_rng().fill_bytes(&mut data);
    data.extend_from_slice(password);
    encrypt_session_key(true, key_hash, &data)
}

/// O3LOGON password key
///
/// Upper-cased user and password are widened to (0, b) pairs, zero-padded to
/// 8 bytes and run through two DES-CBC chains; the second is keyed by the
/// first result.
pub fn o3logon_key(username: &str, password: &str) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = username
        .to_uppercase()
        .bytes()
        .chain(password.to_uppercase().bytes())
        .flat_map(|b| [0, b])
        .collect();
    if buffer.len() % 8 != 0 {
        buffer.resize(buffer.len() + 8 - buffer.len() % 8, 0);
    }
    let key1 = des_chain(&O3LOGON_DES_KEY, &buffer)?;
    let mut key2 = des_chain(&key1, &buffer)?;
    key2.extend_from_slice(&[0u8; 8]);
    Ok(key2)
}

/// Last block of a zero-IV DES-CBC encryption
fn des_chain(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = data.to_vec();
    let len = buffer.len();
    DesCbcEnc::new(key.into(), &[0u8; 8].into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|e| Error::protocol(format!("DES encryption failed: {}", e)))?;
    Ok(buffer[len.saturating_sub(8)..].to_vec())
}

/// O5LOGON password key: SHA1(password ++ salt) ++ 4 zero bytes
pub fn o5logon_key(password: &str, salt_hex: &str) -> Result<Vec<u8>> {
    let salt = hex::decode(salt_hex)
        .map_err(|e| Error::protocol(format!("invalid verifier data hex: {}", e)))?;
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(&salt);
    let mut key = hasher.finalize().to_vec();
    key.extend_from_slice(&[0u8; 4]);
    Ok(key)
}

/// MD5 hash of the XOR of the server and client key parts
pub fn keys_hash(verifier: u32, server_part: &[u8], client_part: &[u8]) -> Result<Vec<u8>> {
    let size = match verifier {
        verifier_type::O3LOGON => 16,
        verifier_type::O5LOGON => 24,
        other => return Err(Error::UnsupportedVerifierType(other)),
    };
    if server_part.len() < size || client_part.len() < size {
        return Err(Error::protocol("session key too short"));
    }
    let mixed: Vec<u8> = server_part
        .iter()
        .zip(client_part)
        .take(size)
        .map(|(a, b)| a ^ b)
        .collect();
    let mut hash = Md5::digest(&mixed[..16]).to_vec();
    if size == 24 {
        hash.extend_from_slice(&Md5::digest(&mixed[16..]));
        hash.truncate(24);
    }
    Ok(hash)
}

/// Key material of one logon, zeroed on drop
pub struct AuthObject {
    /// Verifier type announced with `AUTH_VFR_DATA`
    pub verifier_type: u32,
    /// Salt (hex) from `AUTH_VFR_DATA`
    pub salt: String,
    /// PKCS5 padding of session keys is on
    pub padding: bool,
    /// Encrypted client session key sent as `AUTH_SESSKEY`
    pub encrypted_client_key: String,
    /// Encrypted password sent as `AUTH_PASSWORD`
    pub encrypted_password: String,
    key: Vec<u8>,
    server_key: Vec<u8>,
    client_key: Vec<u8>,
    key_hash: Vec<u8>,
}

impl std::fmt::Debug for AuthObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthObject")
            .field("verifier_type", &self.verifier_type)
            .field("padding", &self.padding)
            .finish_non_exhaustive()
    }
}

impl AuthObject {
    /// Derive every key from the phase-one answer
    ///
    /// `padding` is the server's logon capability; O3LOGON never pads.
    pub fn new(
        username: &str,
        password: &str,
        encrypted_server_key: &str,
        salt: &str,
        verifier: u32,
        padding: bool,
    ) -> Result<Self> {
        let (key, padding) = match verifier {
            verifier_type::O3LOGON => (o3logon_key(username, password)?, false),
            verifier_type::O5LOGON => (o5logon_key(password, salt)?, padding),
            other => return Err(Error::UnsupportedVerifierType(other)),
        };
        let server_key = decrypt_session_key(padding, &key, encrypted_server_key)?;
        if server_key.len() <= 16 {
            return Err(Error::protocol("server session key too short"));
        }

        let mut client_key = vec![0u8; server_key.len()];
        loop {
            rand::thread_rng().fill_bytes(&mut client_key);
            if client_key != server_key {
                break;
            }
        }
        let encrypted_client_key = encrypt_session_key(padding, &key, &client_key)?;
        let key_hash = keys_hash(verifier, &server_key[16..], &client_key[16..])?;
        let encrypted_password = encrypt_password(password.as_bytes(), &key_hash)?;

        Ok(Self {
            verifier_type: verifier,
            salt: salt.to_string(),
            padding,
            encrypted_client_key,
            encrypted_password,
            key,
            server_key,
            client_key,
            key_hash,
        })
    }

    /// Key hash used for password encryption and response checks
    pub fn key_hash(&self) -> &[u8] {
        &self.key_hash
    }

    /// Check `AUTH_SVR_RESPONSE`
    ///
    /// The response is 16 random bytes and the marker, padded with a full
    /// PKCS5 block.
    pub fn verify_response(&self, response: &str) -> bool {
        match decrypt_session_key(false, &self.key_hash, response) {
            Ok(plain) => strip_pkcs5(&plain)
                .and_then(|body| body.get(16..))
                .map_or(false, |marker| marker == &SERVER_TO_CLIENT[..]),
            Err(e) => {
                tracing::debug!(target: "oracle_tns", error = %e, "server response undecodable");
                false
            }
        }
    }
}

impl Drop for AuthObject {
    fn drop(&mut self) {
        for buf in [
            &mut self.key,
            &mut self.server_key,
            &mut self.client_key,
            &mut self.key_hash,
        ] {
            buf.iter_mut().for_each(|b| *b = 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_roundtrip_all_key_sizes() {
        let data = [7u8; 32];
        for size in [16, 24, 32] {
            let key = vec![3u8; size];
            let enc = aes_cbc_encrypt(&key, &data).unwrap();
            assert_ne!(enc, data);
            assert_eq!(aes_cbc_decrypt(&key, &enc).unwrap(), data);
        }
        assert!(aes_cbc_encrypt(&[0u8; 15], &data).is_err());
        assert!(aes_cbc_decrypt(&[0u8; 16], &[0u8; 15]).is_err());
    }

    #[test]
    fn test_session_key_padding() {
        let key = [9u8; 24];
        let plain = [1u8; 40];
        let hex_key = encrypt_session_key(true, &key, &plain).unwrap();
        assert_eq!(hex_key.len(), 96);
        assert_eq!(hex_key, hex_key.to_uppercase());
        assert_eq!(decrypt_session_key(true, &key, &hex_key).unwrap(), plain);
        assert_eq!(decrypt_session_key(false, &key, &hex_key).unwrap().len(), 48);
    }

    #[test]
    fn test_inconsistent_pad_kept() {
        let key = [9u8; 16];
        let mut plain = vec![0u8; 32];
        plain[31] = 3;
        plain[30] = 9;
        let hex_key = encrypt_session_key(false, &key, &plain).unwrap();
        assert_eq!(decrypt_session_key(true, &key, &hex_key).unwrap(), plain);
    }

    #[test]
    fn test_o3logon_key_shape() {
        let key = o3logon_key("scott", "tiger").unwrap();
        assert_eq!(key.len(), 16);
        assert_eq!(&key[8..], &[0u8; 8]);
        assert_eq!(key, o3logon_key("SCOTT", "TIGER").unwrap());
    }

    #[test]
    fn test_o5logon_key() {
        let key = o5logon_key("tiger", "00FF").unwrap();
        let mut hasher = Sha1::new();
        hasher.update(b"tiger\x00\xff");
        assert_eq!(&key[..20], hasher.finalize().as_slice());
        assert_eq!(&key[20..], &[0u8; 4]);
    }

    #[test]
    fn test_keys_hash_lengths() {
        let a = [0x55u8; 32];
        let b = [0xAAu8; 32];
        assert_eq!(keys_hash(verifier_type::O3LOGON, &a, &b).unwrap().len(), 16);
        let h = keys_hash(verifier_type::O5LOGON, &a, &b).unwrap();
        assert_eq!(h.len(), 24);
        assert_eq!(&h[..16], Md5::digest([0xFFu8; 16]).as_slice());
        assert!(matches!(
            keys_hash(verifier_type::PBKDF2, &a, &b),
            Err(Error::UnsupportedVerifierType(18453))
        ));
    }

    /// Play the server side of an O5LOGON exchange
    #[test]
    fn test_o5logon_exchange() {
        let salt = "0A0B0C0D0E0F10111213";
        let key = o5logon_key("tiger", salt).unwrap();
        let server_key = [0x42u8; 48];
        let encrypted = encrypt_session_key(false, &key, &server_key).unwrap();

        let auth = AuthObject::new("scott", "tiger", &encrypted, salt, verifier_type::O5LOGON, false).unwrap();
        let client_key = decrypt_session_key(false, &key, &auth.encrypted_client_key).unwrap();
        assert_eq!(client_key.len(), 48);
        assert_ne!(client_key, server_key);

        let hash = keys_hash(verifier_type::O5LOGON, &server_key[16..], &client_key[16..]).unwrap();
        assert_eq!(auth.key_hash(), hash.as_slice());
        let password = decrypt_session_key(true, &hash, &auth.encrypted_password).unwrap();
        assert_eq!(&password[16..], b"tiger");

        let mut response = vec![0x11u8; 16];
        response.extend_from_slice(SERVER_TO_CLIENT);
        let response = encrypt_session_key(true, &hash, &response).unwrap();
        assert!(auth.verify_response(&response));
        assert!(!auth.verify_response("00"));
    }

    #[test]
    fn test_server_response_full_pad_block() {
        let salt = "0102";
        let key = o5logon_key("tiger", salt).unwrap();
        let encrypted = encrypt_session_key(false, &key, &[0x37u8; 48]).unwrap();
        let auth = AuthObject::new("scott", "tiger", &encrypted, salt, verifier_type::O5LOGON, false).unwrap();

        let mut plain = vec![0x5Au8; 16];
        plain.extend_from_slice(SERVER_TO_CLIENT);
        let response = encrypt_session_key(true, auth.key_hash(), &plain).unwrap();
        // 32 bytes of payload plus a whole block of 0x10
        assert_eq!(response.len(), 96);
        assert!(auth.verify_response(&response));

        let mut tampered = hex::decode(&response).unwrap();
        tampered[20] ^= 0x01;
        assert!(!auth.verify_response(&hex::encode_upper(tampered)));

        let unpadded = encrypt_session_key(false, auth.key_hash(), &plain).unwrap();
        assert!(!auth.verify_response(&unpadded));
    }

    #[test]
    fn test_strip_pkcs5() {
        let mut data = vec![1u8, 2, 3];
        pkcs5_pad(&mut data);
        assert_eq!(strip_pkcs5(&data), Some(&[1u8, 2, 3][..]));
        assert_eq!(strip_pkcs5(&[0x10u8; 16]), Some(&[][..]));
        assert_eq!(strip_pkcs5(&[1, 2, 0]), None);
        assert_eq!(strip_pkcs5(&[1, 3, 2]), None);
        assert_eq!(strip_pkcs5(&[]), None);
    }

    #[test]
    fn test_o3logon_exchange() {
        let key = o3logon_key("scott", "tiger").unwrap();
        let server_key = [0x24u8; 32];
        let encrypted = encrypt_session_key(false, &key, &server_key).unwrap();
        let auth = AuthObject::new("scott", "tiger", &encrypted, "", verifier_type::O3LOGON, true).unwrap();
        assert!(!auth.padding);
        assert_eq!(auth.key_hash().len(), 16);
    }

    #[test]
    fn test_unsupported_verifier() {
        let result = AuthObject::new("u", "p", "00", "", 1234, false);
        assert!(matches!(result, Err(Error::UnsupportedVerifierType(1234))));
    }
}
