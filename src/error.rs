pub type AppResult<T> = Result<T, AppErr>;

#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config: {0}")]
    Config(#[from] envy::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("WebSocket: {0}")]
    Ws(#[from] axum::Error),

    #[error("Decode: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("write failed after {attempts} attempts: {reason}")]
    WriteFailed { attempts: u32, reason: String },

    #[error("no traffic for {0:?}")]
    IdleTimeout(std::time::Duration),

    #[error("Handshake: {0}")]
    Handshake(String),

    #[error("hub is no longer running")]
    HubClosed,
}

/* ── helper: anything displayable → InvalidConfig ── */
pub fn invalid<E: std::fmt::Display>(e: E) -> AppErr { AppErr::InvalidConfig(e.to_string()) }
