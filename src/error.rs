use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("Invalid track cut {0:?}, expected FROM-TO-TRACK")]
    InvalidTrackCut(String),
    #[error("Unknown line {0:?}")]
    UnknownLine(String),
    #[error("Invalid line count {0:?}, expected LINE=N")]
    InvalidLineCount(String),
    #[error("Unknown island {0:?}")]
    UnknownIsland(String),
    #[error("Requested {requested} units but the island only has {available}")]
    CapacityExceeded { requested: u32, available: u32 },
    #[error("Unknown circulation {0:?}")]
    UnknownCirculation(String),
    #[error("Circulation {circulation} has no time at {station}")]
    NoReliefTime { circulation: String, station: String },
    #[error("Invalid relief query {0:?}, expected CODE or CODE@STATION")]
    InvalidReliefQuery(String),
}

pub type Result<T> = std::result::Result<T, Error>;
