//! Client for the external object store holding product images.
//!
//! Objects are written with `PUT {base_url}{key}` and removed with
//! `DELETE {base_url}{key}`. Public links are built from `public_url`, which
//! may point at a CDN in front of the store.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use url::Url;

use crate::config::ImageStoreConfig;

/// Errors that can occur when talking to the object store.
#[derive(Debug, Error)]
pub enum ImageStoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store returned an error response.
    #[error("object store error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Key could not be joined onto the base URL.
    #[error("invalid object key {0}")]
    InvalidKey(String),

    /// Client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Object store client.
#[derive(Clone)]
pub struct ImageStoreClient {
    client: reqwest::Client,
    base_url: Url,
    public_url: Url,
}

impl ImageStoreClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ImageStoreConfig) -> Result<Self, ImageStoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| ImageStoreError::Config(format!("invalid token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            public_url: config.public_url.clone(),
        })
    }

    /// Public URL clients use to fetch an object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key cannot be joined.
    pub fn public_url(&self, key: &str) -> Result<String, ImageStoreError> {
        self.public_url
            .join(key)
            .map(String::from)
            .map_err(|_| ImageStoreError::InvalidKey(key.to_string()))
    }

    /// Upload an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the store rejects it.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ImageStoreError> {
        let url = self.object_url(key)?;
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check_status(response).await
    }

    /// Delete an object. A missing object counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the store rejects it.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<(), ImageStoreError> {
        let url = self.object_url(key)?;
        let response = self.client.delete(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await
    }

    /// Best-effort delete of several objects; failures are logged, not returned.
    pub async fn delete_all(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete stored object");
            }
        }
    }

    fn object_url(&self, key: &str) -> Result<Url, ImageStoreError> {
        self.base_url
            .join(key)
            .map_err(|_| ImageStoreError::InvalidKey(key.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), ImageStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(ImageStoreError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> ImageStoreClient {
        ImageStoreClient::new(&ImageStoreConfig {
            base_url: Url::parse("http://store.internal/bucket/").unwrap(),
            public_url: Url::parse("https://cdn.example.com/img/").unwrap(),
            token: None,
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_uses_public_base() {
        let url = client().public_url("products/7/abc.jpg").unwrap();
        assert_eq!(url, "https://cdn.example.com/img/products/7/abc.jpg");
    }

    #[test]
    fn test_object_url_uses_store_base() {
        let url = client().object_url("products/7/abc.jpg").unwrap();
        assert_eq!(url.as_str(), "http://store.internal/bucket/products/7/abc.jpg");
    }
}
