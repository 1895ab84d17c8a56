use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ui client: {0}")]
    Lines(#[from] tokio_util::codec::LinesCodecError),
    #[error("config: {0}")]
    Config(String),
}
