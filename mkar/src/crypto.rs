//! PBKDF2-HMAC-SHA256 key derivation and AES-128-CBC + PKCS7 encryption,
//! gated behind the `encryption` cargo feature.

use crate::Error;

pub const SALT_SIZE: usize = 16;
pub const IV_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;
pub const PBKDF2_ITERATIONS: u32 = 100_000;

#[cfg(feature = "encryption")]
mod imp {
    use super::*;
    use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
    use aes::Aes128;
    use cbc::{Decryptor, Encryptor};
    use rand::RngCore;

    type Enc = Encryptor<Aes128>;
    type Dec = Decryptor<Aes128>;

    pub fn derive(password: &str, salt: &[u8; SALT_SIZE]) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
            password.as_bytes(),
            salt,
            PBKDF2_ITERATIONS,
            &mut key,
        );
        key
    }

    /// Encrypts `plaintext` under key index `kix`'s password, returning
    /// `LE(kix,4) || salt || iv || ciphertext`.
    pub fn encrypt(plaintext: &[u8], kix: u32, password: &str) -> Vec<u8> {
        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        rand::thread_rng().fill_bytes(&mut iv);
        let key = derive(password, &salt);

        let cipher = Enc::new(&key.into(), &iv.into());
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut out = Vec::with_capacity(4 + SALT_SIZE + IV_SIZE + ciphertext.len());
        out.extend_from_slice(&kix.to_le_bytes());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        out
    }

    /// Parses `LE(kix,4) || salt || iv || ciphertext` and decrypts with
    /// `password`. Returns `Error::IncorrectPassword` on a padding/
    /// authentication failure so the caller can re-prompt.
    pub fn decrypt(bytes: &[u8], password: &str) -> Result<Vec<u8>, Error> {
        let kix = u32::from_le_bytes(
            bytes
                .get(0..4)
                .ok_or(Error::Corruption("encrypted payload shorter than kix field"))?
                .try_into()
                .unwrap(),
        );
        let salt: [u8; SALT_SIZE] = bytes
            .get(4..4 + SALT_SIZE)
            .ok_or(Error::Corruption("encrypted payload shorter than salt field"))?
            .try_into()
            .unwrap();
        let iv: [u8; IV_SIZE] = bytes
            .get(4 + SALT_SIZE..4 + SALT_SIZE + IV_SIZE)
            .ok_or(Error::Corruption("encrypted payload shorter than iv field"))?
            .try_into()
            .unwrap();
        let ciphertext = &bytes[4 + SALT_SIZE + IV_SIZE..];

        let key = derive(password, &salt);
        let cipher = Dec::new(&key.into(), &iv.into());
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::IncorrectPassword(kix))
    }

    pub fn kix_of(bytes: &[u8]) -> Result<u32, Error> {
        let raw: [u8; 4] = bytes
            .get(0..4)
            .ok_or(Error::Corruption("encrypted payload shorter than kix field"))?
            .try_into()
            .unwrap();
        Ok(u32::from_le_bytes(raw))
    }
}

#[cfg(feature = "encryption")]
pub use imp::*;

#[cfg(not(feature = "encryption"))]
pub fn encrypt(_plaintext: &[u8], _kix: u32, _password: &str) -> Vec<u8> {
    unreachable!("gated behind the `encryption` feature by callers")
}

#[cfg(not(feature = "encryption"))]
pub fn decrypt(_bytes: &[u8], _password: &str) -> Result<Vec<u8>, Error> {
    Err(Error::FeatureDisabled("encryption"))
}

#[cfg(not(feature = "encryption"))]
pub fn kix_of(_bytes: &[u8]) -> Result<u32, Error> {
    Err(Error::FeatureDisabled("encryption"))
}

#[cfg(all(test, feature = "encryption"))]
mod test {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let plaintext = b"the archive payload goes here, padded or not".to_vec();
        let ciphertext = encrypt(&plaintext, 7, "hunter2");
        assert_eq!(kix_of(&ciphertext).unwrap(), 7);
        let recovered = decrypt(&ciphertext, "hunter2").unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn wrong_password_is_reported_as_incorrect() {
        let plaintext = b"secret bytes".to_vec();
        let ciphertext = encrypt(&plaintext, 1, "correct horse");
        let err = decrypt(&ciphertext, "wrong password").unwrap_err();
        assert!(matches!(err, Error::IncorrectPassword(1)));
    }
}
