//! Remote translation source
//!
//! The wire transport is an external collaborator: anything that can turn a
//! resource path into fetched bytes. The engine ships an HTTP
//! implementation; tests substitute an in-memory one.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Catalog resource path under the source root
pub(crate) const CATALOG_RESOURCE: &str = "list.json";

/// Book-names resource path for one translation
pub(crate) fn books_resource(short_name: &str) -> String {
    format!("{short_name}/books.json")
}

/// Chapter resource path for one translation
pub(crate) fn chapter_resource(short_name: &str, book_index: i32, chapter_index: i32) -> String {
    format!("{short_name}/{book_index}-{chapter_index}.json")
}

/// Byte-stream-producing fetch over some transport
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

/// [`RemoteSource`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
