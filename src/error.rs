use std::fmt;

#[derive(Debug)]
pub enum Error {
    DataLoad(String),
    Config(String),
    InvalidPosition { latitude: f64, longitude: f64 },
    RequestFailed(attohttpc::Error),
    CsvParseError(csv::Error),
    JSONParseError(serde_json::Error),
    IOError(std::io::Error),
    NotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataLoad(msg) => write!(f, "Could not load data: {}", msg),
            Self::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            Self::InvalidPosition {
                latitude,
                longitude,
            } => write!(f, "Invalid position {}, {}", latitude, longitude),
            Self::RequestFailed(e) => write!(f, "Request failed: {}", e),
            Self::CsvParseError(e) => write!(f, "Could not parse CSV: {}", e),
            Self::JSONParseError(e) => write!(f, "Could not parse JSON: {}", e),
            Self::IOError(e) => write!(f, "IO error: {}", e),
            Self::NotFound => write!(f, "Not found"),
        }
    }
}

impl std::error::Error for Error {}

impl From<attohttpc::Error> for Error {
    fn from(e: attohttpc::Error) -> Self {
        Self::RequestFailed(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Self::CsvParseError(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::JSONParseError(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IOError(e)
    }
}
