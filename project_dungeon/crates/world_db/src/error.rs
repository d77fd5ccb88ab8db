use dungeon::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldDbError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored world {id} is corrupt: {source}")]
    CorruptWorld {
        id: String,
        source: space::LayoutError,
    },
}

impl From<WorldDbError> for StoreError {
    fn from(e: WorldDbError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub(crate) fn backend(e: rusqlite::Error) -> StoreError {
    WorldDbError::Database(e).into()
}
