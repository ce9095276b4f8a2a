#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Could not initialize Discord RPC transport: {0}")]
    TransportInit(String),

    #[error("Failed to push presence update: {0}")]
    Push(String),

    #[error("Connector is not ready")]
    NotReady,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RpcError> for String {
    fn from(e: RpcError) -> Self {
        e.to_string()
    }
}
