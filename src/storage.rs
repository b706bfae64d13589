//! Document-store collaborator boundary.
//!
//! The engine treats file storage as an opaque path-based blob interface;
//! bucket naming and path formats are caller concerns.

use crate::error::{ExtractionError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn get_public_url(&self, path: &str) -> String;

    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String>;

    async fn remove(&self, paths: &[String]) -> Result<()>;
}

/// Simple in-memory store, used by tests and small single-process
/// deployments.
#[derive(Default)]
pub struct InMemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.blobs.lock().unwrap().insert(path.into(), bytes);
        self
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn get_public_url(&self, path: &str) -> String {
        format!("memory://{}", path)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ExtractionError::StorageError(format!("No such blob: {}", path)))
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String> {
        self.blobs.lock().unwrap().insert(path.to_string(), bytes);
        Ok(path.to_string())
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let mut blobs = self.blobs.lock().unwrap();
        for path in paths {
            blobs.remove(path);
        }
        Ok(())
    }
}
