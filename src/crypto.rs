//! Mailbox credential decryption.
//!
//! Interoperates with the upstream system's AES encryption:
//! 1. SHA-512 over the shared secret → 64-byte password
//! 2. PBKDF2-HMAC-SHA512 (salt `01..08`, 1000 rounds) → 48 bytes
//!    (first 32 = AES-256 key, last 16 = IV)
//! 3. AES-256-CBC decrypt, then PKCS#7 unpad
//!
//! Pure and deterministic; callers log the failure cause.

use aes::Aes256;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use sha2::{Digest, Sha512};

use crate::error::DecryptError;

type Aes256CbcDec = cbc::Decryptor<Aes256>;

const SALT: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
const PBKDF2_ROUNDS: u32 = 1000;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_SIZE: usize = 16;

/// Decrypt a base64 ciphertext produced by the upstream system.
pub fn decrypt_credential(ciphertext_b64: &str, shared_secret: &str) -> Result<String, DecryptError> {
    let mut buf = STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|e| DecryptError::InvalidBase64(e.to_string()))?;

    if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
        return Err(DecryptError::InvalidLength { len: buf.len() });
    }

    let len = buf.len();
    let (key, iv) = derive_key_iv(shared_secret);
    let plain = Aes256CbcDec::new(key.as_slice().into(), iv.as_slice().into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| DecryptError::InvalidLength { len })?;

    let unpadded = strip_pkcs7(plain)?;
    String::from_utf8(unpadded.to_vec()).map_err(|_| DecryptError::InvalidUtf8)
}

/// Derive the AES key and IV from the shared secret.
fn derive_key_iv(shared_secret: &str) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let password = Sha512::digest(shared_secret.as_bytes());

    let mut derived = [0u8; KEY_LEN + IV_LEN];
    pbkdf2::pbkdf2_hmac::<Sha512>(&password, &SALT, PBKDF2_ROUNDS, &mut derived);

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&derived[..KEY_LEN]);
    iv.copy_from_slice(&derived[KEY_LEN..]);
    (key, iv)
}

/// Remove PKCS#7 padding. Only the final byte is inspected.
fn strip_pkcs7(buf: &[u8]) -> Result<&[u8], DecryptError> {
    let Some(&pad) = buf.last() else {
        return Err(DecryptError::InvalidLength { len: 0 });
    };
    let pad_len = usize::from(pad);
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > buf.len() {
        return Err(DecryptError::InvalidPadding(pad));
    }
    Ok(&buf[..buf.len() - pad_len])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-shared-secret";

    // ── Known vectors ───────────────────────────────────────────────

    #[test]
    fn decrypts_known_vector() {
        let plain = decrypt_credential("QP5m9wHdUmsJMMjyGTsY6a+TYTYUvT/CXAJGKxpSyz0=", SECRET).unwrap();
        assert_eq!(plain, "s3cret-Mailbox.Pass");
    }

    #[test]
    fn decrypts_upstream_reference_vector() {
        let upstream_secret = "3NcR1p+¡OnP4s$W0rDN@m3k3yV@lv3C0mP4NYC|B3RG3$+!0NM0DVL0|CB4CK3NDW3B";
        let plain = decrypt_credential("GJNZHDycfmk6C7Ubv/EHUg==", upstream_secret).unwrap();
        assert_eq!(plain, "A2@mail2019Sgp");
    }

    #[test]
    fn decrypts_multibyte_plaintext() {
        let plain = decrypt_credential("FAimFyg2bRy2ixqLK87vheDi6HjFF3Cy6lv5NB9kFjg=", SECRET).unwrap();
        assert_eq!(plain, "contraseña ñ 16b!");
    }

    #[test]
    fn decrypts_with_non_ascii_secret() {
        let plain = decrypt_credential("ZccucN/eGAVny12bSBQEqQ==", "clave-compartida-ñ").unwrap();
        assert_eq!(plain, "Buzón#2024");
    }

    #[test]
    fn decrypts_full_padding_block() {
        let plain = decrypt_credential("14vTodGT1lJ5RQoOJGByff9HjrVUk8QKFVyhhy00Kig=", SECRET).unwrap();
        assert_eq!(plain, "exactly16bytes!!");
    }

    #[test]
    fn decrypts_empty_plaintext() {
        let plain = decrypt_credential("ODiJaZQLkbgx8x5b0UwxQA==", SECRET).unwrap();
        assert_eq!(plain, "");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let plain = decrypt_credential("  QP5m9wHdUmsJMMjyGTsY6a+TYTYUvT/CXAJGKxpSyz0=\n", SECRET).unwrap();
        assert_eq!(plain, "s3cret-Mailbox.Pass");
    }

    // ── Failure modes ───────────────────────────────────────────────

    #[test]
    fn invalid_base64_fails() {
        let err = decrypt_credential("not base64!!", SECRET).unwrap_err();
        assert!(matches!(err, DecryptError::InvalidBase64(_)));
    }

    #[test]
    fn length_not_multiple_of_block_fails() {
        // 15 bytes
        let err = decrypt_credential("AAAAAAAAAAAAAAAAAAAA", SECRET).unwrap_err();
        assert!(matches!(err, DecryptError::InvalidLength { len: 15 }));

        // 17 bytes
        let err = decrypt_credential("AAAAAAAAAAAAAAAAAAAAAAA=", SECRET).unwrap_err();
        assert!(matches!(err, DecryptError::InvalidLength { len: 17 }));
    }

    #[test]
    fn empty_ciphertext_fails() {
        let err = decrypt_credential("", SECRET).unwrap_err();
        assert!(matches!(err, DecryptError::InvalidLength { len: 0 }));
    }

    #[test]
    fn zero_padding_byte_fails() {
        let err = decrypt_credential("xOnNe+LdsYx1+sXvbIsQBQ==", SECRET).unwrap_err();
        assert!(matches!(err, DecryptError::InvalidPadding(0)));
    }

    #[test]
    fn padding_byte_above_block_size_fails() {
        let err = decrypt_credential("1aCiYgaavDx9P93gjXHvJw==", SECRET).unwrap_err();
        assert!(matches!(err, DecryptError::InvalidPadding(17)));
    }

    #[test]
    fn non_utf8_plaintext_fails() {
        let err = decrypt_credential("/jqfq/D49vVdd72iv/Xj7A==", SECRET).unwrap_err();
        assert!(matches!(err, DecryptError::InvalidUtf8));
    }

    #[test]
    fn wrong_secret_fails() {
        let err = decrypt_credential("ngR9nAfpohDc7j/ymss1DnhmfStNixOHoUbwgGH3F3A=", SECRET).unwrap_err();
        assert!(matches!(err, DecryptError::InvalidPadding(0x98)));
    }

    #[test]
    fn every_failure_reads_as_decryption_failed() {
        let errors = [
            DecryptError::InvalidBase64("x".into()),
            DecryptError::InvalidLength { len: 3 },
            DecryptError::InvalidPadding(0),
            DecryptError::InvalidUtf8,
        ];
        for err in errors {
            assert!(err.to_string().starts_with("decryption failed"));
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    #[test]
    fn strip_pkcs7_removes_declared_length() {
        let buf = [b'a', b'b', 3, 3, 3];
        assert_eq!(strip_pkcs7(&buf).unwrap(), b"ab");
    }

    #[test]
    fn derive_key_iv_is_deterministic() {
        let (k1, iv1) = derive_key_iv(SECRET);
        let (k2, iv2) = derive_key_iv(SECRET);
        assert_eq!(k1, k2);
        assert_eq!(iv1, iv2);
        let (k3, _) = derive_key_iv("other");
        assert_ne!(k1, k3);
    }
}
