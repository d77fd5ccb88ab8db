use space::MoveError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} already exists")]
    AlreadyExists(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("player not found")]
    PlayerNotFound(String),

    #[error("world not found")]
    WorldNotFound(String),

    #[error("mob not found")]
    MobNotFound(String),

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error("could not find valid spawn position in {world_id} after {attempts} attempts")]
    SpawnExhausted { world_id: String, attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}
