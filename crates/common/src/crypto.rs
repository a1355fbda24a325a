use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

const NONCE_LEN: usize = 24;

fn cipher_for(salt: &str) -> XSalsa20Poly1305 {
    let key_bytes = blake3::hash(salt.as_bytes());
    let key = Key::from_slice(key_bytes.as_bytes());
    XSalsa20Poly1305::new(key)
}

/// Seals `plaintext` under a key derived from `salt`. Output is
/// base64(nonce || ciphertext), suitable for use as a bearer token.
pub fn encrypt(plaintext: &str, salt: &str) -> Result<String> {
    let cipher = cipher_for(salt);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::fill(&mut nonce_bytes[..]);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("encrypt failed: {e}"))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

pub fn decrypt(token: &str, salt: &str) -> Result<String> {
    let sealed = URL_SAFE_NO_PAD.decode(token)?;
    if sealed.len() <= NONCE_LEN {
        return Err(anyhow!("token too short"));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = cipher_for(salt);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| anyhow!("decrypt failed: {e}"))?;

    Ok(String::from_utf8(plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let token = encrypt("hello keeper", "salt-a").unwrap();
        assert_eq!(decrypt(&token, "salt-a").unwrap(), "hello keeper");
    }

    #[test]
    fn wrong_salt_rejected() {
        let token = encrypt("hello keeper", "salt-a").unwrap();
        assert!(decrypt(&token, "salt-b").is_err());
    }
}
