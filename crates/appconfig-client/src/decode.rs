// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pluggable payload decoding.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Payload could not be turned into a configuration value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    /// Failure reported by a custom deserializer.
    #[error("{0}")]
    Custom(String),
}

/// Turns raw payload bytes into a configuration value.
pub trait Deserializer<T>: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<T, DecodeError>;
}

/// Decodes UTF-8 JSON payloads with `serde_json`.
pub struct JsonDeserializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDeserializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDeserializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDeserializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDeserializer").finish()
    }
}

impl<T: DeserializeOwned> Deserializer<T> for JsonDeserializer<T> {
    fn decode(&self, payload: &[u8]) -> Result<T, DecodeError> {
        let text = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str(text)?)
    }
}

impl<T, F> Deserializer<T> for F
where
    F: Fn(&[u8]) -> Result<T, DecodeError> + Send + Sync,
{
    fn decode(&self, payload: &[u8]) -> Result<T, DecodeError> {
        self(payload)
    }
}
