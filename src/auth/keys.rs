use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use thiserror::Error;

/// HS256 needs at least 256 bits of key material
pub const MIN_SECRET_BYTES: usize = 32;

const SECRET_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("signing secret is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("signing secret is {0} bytes, at least 32 required")]
    TooShort(usize),
}

/// Source of the key material used to sign and verify tokens
pub trait SigningKeys: Send + Sync {
    fn algorithm(&self) -> Algorithm;
    fn encoding_key(&self) -> &EncodingKey;
    fn decoding_key(&self) -> &DecodingKey;
}

/// A single HMAC-SHA256 key fixed for the process lifetime
#[derive(Clone)]
pub struct StaticKey {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKey")
            .field("algorithm", &Algorithm::HS256)
            .field("secret", &"[hidden]")
            .finish()
    }
}

impl StaticKey {
    /// Derive the key from a base64-encoded secret
    pub fn from_base64(secret: &str) -> Result<Self, KeyError> {
        let bytes = SECRET_ENGINE.decode(secret.trim())?;
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(KeyError::TooShort(bytes.len()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&bytes),
            decoding_key: DecodingKey::from_secret(&bytes),
        })
    }
}

impl SigningKeys for StaticKey {
    fn algorithm(&self) -> Algorithm {
        Algorithm::HS256
    }

    fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

#[cfg(test)]
pub(crate) fn encode_secret(raw: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(raw)
}
