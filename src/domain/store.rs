/// Persistence collaborator for per-direction settings.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    /// Persist a single entry. Implementations write through immediately.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
