//! Session salts and the method-1 password obfuscation.
//!
//! On connect the server sends a random salt. The client encodes every
//! password byte `p` as two characters of a 64-symbol alphabet, each
//! shifted by the salt byte at the same position:
//!
//! ```text
//! c1 = ALPHABET[(p / 16 + salt[i]) % 64]
//! c2 = ALPHABET[(p % 16 + salt[i]) % 64]
//! ```
//!
//! Decoding undoes the shift. Both recovered nibbles must be below 16,
//! otherwise the ciphertext was not produced with this salt.

use rand::Rng;

use crate::SessionError;

/// Number of characters in a session salt.
pub const SALT_LEN: usize = 32;

const ALPHABET: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";

/// Generates a salt of [`SALT_LEN`] random lowercase ASCII letters.
pub fn generate_salt() -> String {
    let mut rng = rand::rng();
    (0..SALT_LEN)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// Recovers the plaintext password from a method-1 ciphertext.
///
/// # Errors
/// [`SessionError::MalformedCredential`] if the ciphertext has odd
/// length, is longer than the salt allows, uses a symbol outside the
/// alphabet, or yields a nibble of 16 or more.
pub fn decrypt_password(ciphertext: &str, salt: &str) -> Result<String, SessionError> {
    let cipher = ciphertext.as_bytes();
    let salt = salt.as_bytes();

    if cipher.len() % 2 != 0 {
        return Err(malformed("odd ciphertext length"));
    }
    if cipher.len() / 2 > salt.len() {
        return Err(malformed("ciphertext longer than salt"));
    }

    cipher
        .chunks_exact(2)
        .zip(salt)
        .map(|(pair, &key)| {
            let high = unshift(pair[0], key)?;
            let low = unshift(pair[1], key)?;
            Ok(char::from(high * 16 + low))
        })
        .collect()
}

/// Encodes a password the way a client does. The inverse of
/// [`decrypt_password`].
///
/// # Errors
/// [`SessionError::MalformedCredential`] if the password is longer than
/// the salt or contains a character above U+00FF.
pub fn encrypt_password(password: &str, salt: &str) -> Result<String, SessionError> {
    let salt = salt.as_bytes();
    if password.chars().count() > salt.len() {
        return Err(malformed("password longer than salt"));
    }

    let mut out = String::with_capacity(password.len() * 2);
    for (c, &key) in password.chars().zip(salt) {
        let p = u8::try_from(u32::from(c))
            .map_err(|_| malformed("password character out of range"))?;
        let key = usize::from(key);
        out.push(char::from(ALPHABET[(usize::from(p / 16) + key) % 64]));
        out.push(char::from(ALPHABET[(usize::from(p % 16) + key) % 64]));
    }
    Ok(out)
}

fn unshift(symbol: u8, key: u8) -> Result<u8, SessionError> {
    let index = ALPHABET
        .iter()
        .position(|&a| a == symbol)
        .ok_or_else(|| malformed("symbol outside alphabet"))?;
    let nibble = (index as i32 - i32::from(key)).rem_euclid(64);
    if nibble >= 16 {
        return Err(malformed("nibble out of range"));
    }
    Ok(nibble as u8)
}

fn malformed(reason: &str) -> SessionError {
    SessionError::MalformedCredential(reason.to_string())
}
