//! Pluggable response body decoding.
//!
//! The dispatcher knows nothing about body formats. Callers pick a
//! [`Decoder`] per request: [`Json`] for REST APIs such as Modrinth,
//! [`Xml`] for Maven metadata, or their own implementation.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised while turning a response body into a model
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    /// The body is not valid JSON for the requested model
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// The body is not valid XML for the requested model
    #[error("{0}")]
    Xml(#[from] quick_xml::DeError),

    /// A custom decoder rejected the body
    #[error("{0}")]
    Custom(String),
}

/// Turns a response body into a typed model
pub trait Decoder {
    /// Decode `body` into a `T`
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if `body` does not describe a valid `T`.
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, DecodeError>;
}

/// Decodes JSON bodies with `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Decoder for Json {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, DecodeError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Decodes XML bodies with `quick-xml`
#[derive(Debug, Clone, Copy, Default)]
pub struct Xml;

impl Decoder for Xml {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, DecodeError> {
        let text = std::str::from_utf8(body).map_err(|e| DecodeError::Custom(e.to_string()))?;
        Ok(quick_xml::de::from_str(text)?)
    }
}

impl<D: Decoder + ?Sized> Decoder for &D {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, DecodeError> {
        (**self).decode(body)
    }
}
