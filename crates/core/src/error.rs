#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Malformed URL {url}: {detail}")]
    MalformedUrl { url: String, detail: String },

    #[error("Transport failure for {url}: {detail}")]
    Transport { url: String, detail: String },

    #[error("Unexpected HTTP status {0}")]
    BadStatus(u16),

    #[error("Could not build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty response body")]
    Empty,

    #[error("Malformed JSON: {0}")]
    Malformed(String),

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("Item {index} is invalid: {detail}")]
    InvalidItem { index: usize, detail: String },
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Malformed base URL {url}: {detail}")]
    MalformedUrl { url: String, detail: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Cover image could not be decoded: {0}")]
    Decode(String),

    /// The fetch was superseded by a rebind. Expected, not a failure.
    #[error("Fetch superseded by a newer binding")]
    Canceled,
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("Index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
