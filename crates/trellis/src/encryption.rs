// Trellis
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! AES-256-GCM encryption for cookies and tokens

use crate::error::{FrameworkError, FrameworkResult};
use base64::{Engine as _, engine::general_purpose};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

/// Prefix marking a base64 encoded key in `APP_KEY`
pub const KEY_PREFIX: &str = "base64:";

pub const KEY_LEN: usize = 32;

/// Symmetric encrypter. Payloads are `base64url(nonce || ciphertext || tag)`.
pub struct Encrypter {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl Encrypter {
    pub fn new(key: &[u8]) -> FrameworkResult<Self> {
        if key.len() != KEY_LEN {
            return Err(FrameworkError::InvalidKey {
                message: format!("expected {} bytes, got {}", KEY_LEN, key.len()),
            });
        }

        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| FrameworkError::InvalidKey {
            message: "key rejected by AES-256-GCM".to_string(),
        })?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Build from an `app.key` value, either `base64:<key>` or a raw 32 byte string
    pub fn from_app_key(value: &str) -> FrameworkResult<Self> {
        if value.is_empty() {
            return Err(FrameworkError::InvalidKey {
                message: "no application key set, run app:key".to_string(),
            });
        }

        match value.strip_prefix(KEY_PREFIX) {
            Some(encoded) => {
                let key = general_purpose::STANDARD.decode(encoded).map_err(|e| FrameworkError::InvalidKey { message: e.to_string() })?;
                Self::new(&key)
            }
            None => Self::new(value.as_bytes()),
        }
    }

    /// A fresh random key formatted for `APP_KEY`
    pub fn generate_key() -> FrameworkResult<String> {
        let mut key = [0u8; KEY_LEN];
        SystemRandom::new().fill(&mut key).map_err(|_| FrameworkError::Encryption {
            message: "random generator failure".to_string(),
        })?;
        Ok(format!("{}{}", KEY_PREFIX, general_purpose::STANDARD.encode(key)))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> FrameworkResult<String> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(|_| FrameworkError::Encryption {
            message: "random generator failure".to_string(),
        })?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| FrameworkError::Encryption {
                message: "sealing failed".to_string(),
            })?;

        let mut payload = Vec::with_capacity(NONCE_LEN + in_out.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&in_out);
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(payload))
    }

    pub fn encrypt_string(&self, plaintext: &str) -> FrameworkResult<String> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt a payload; tampered or foreign payloads yield `InvalidPayload`
    pub fn decrypt(&self, payload: &str) -> FrameworkResult<Vec<u8>> {
        let data = general_purpose::URL_SAFE_NO_PAD.decode(payload).map_err(|_| FrameworkError::InvalidPayload)?;
        if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(FrameworkError::InvalidPayload);
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| FrameworkError::InvalidPayload)?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = self.key.open_in_place(nonce, Aad::empty(), &mut in_out).map_err(|_| FrameworkError::InvalidPayload)?;
        Ok(plaintext.to_vec())
    }

    pub fn decrypt_string(&self, payload: &str) -> FrameworkResult<String> {
        String::from_utf8(self.decrypt(payload)?).map_err(|_| FrameworkError::InvalidPayload)
    }
}

/// Compare two secrets without leaking timing information
#[allow(deprecated)]
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}
