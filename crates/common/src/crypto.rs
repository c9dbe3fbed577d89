use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305, NONCE_SIZE};

pub fn blake3_hash(input: &[u8]) -> [u8; 32] {
    *blake3::hash(input).as_bytes()
}

/// Secretbox with a blake3-derived key. Output is base64url(nonce || ciphertext).
pub fn encrypt(plaintext: &str, secret: &str) -> Result<String> {
    let key = blake3_hash(secret.as_bytes());
    let cipher = XSalsa20Poly1305::new(Key::from_slice(&key));

    let mut nonce = [0u8; NONCE_SIZE];
    rand::fill(&mut nonce[..]);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| anyhow!("encryption failed: {}", e))?;

    let mut raw = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

pub fn decrypt(token: &str, secret: &str) -> Result<String> {
    let raw = URL_SAFE_NO_PAD.decode(token)?;
    if raw.len() <= NONCE_SIZE {
        return Err(anyhow!("token too short"));
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);

    let key = blake3_hash(secret.as_bytes());
    let cipher = XSalsa20Poly1305::new(Key::from_slice(&key));

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("decryption failed: {}", e))?;
    Ok(String::from_utf8(plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let token = encrypt("{\"user_id\":\"abc\"}", "test-salt").unwrap();
        let plaintext = decrypt(&token, "test-salt").unwrap();
        assert_eq!(plaintext, "{\"user_id\":\"abc\"}");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = encrypt("payload", "salt-a").unwrap();
        assert!(decrypt(&token, "salt-b").is_err());
    }

    #[test]
    fn tampered_token_rejected() {
        let token = encrypt("payload", "salt").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        assert!(decrypt(&tampered, "salt").is_err());
    }
}
