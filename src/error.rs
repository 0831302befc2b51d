use std::fmt;

#[derive(Debug)]
pub enum SeqsumError {
    /// Read/write/list failure against the durable store. No internal retry;
    /// trigger redelivery is the recovery path.
    Store(String),
    /// Filtered sequence shorter than the k-mer width. Fatal for the unit.
    InputTooShort { length: u64, k: usize },
    /// Batch descriptor missing a usable expected count or k-mer size.
    MalformedBatch(String),
    Serialization(serde_json::Error),
    Io(std::io::Error),
    Other(String),
}

impl fmt::Display for SeqsumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqsumError::Store(e) => write!(f, "Store error: {}", e),
            SeqsumError::InputTooShort { length, k } => write!(
                f,
                "Input too short: {} filtered bases, k-mer size is {}",
                length, k
            ),
            SeqsumError::MalformedBatch(e) => write!(f, "Malformed batch: {}", e),
            SeqsumError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SeqsumError::Io(e) => write!(f, "IO error: {}", e),
            SeqsumError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for SeqsumError {}

impl From<serde_json::Error> for SeqsumError {
    fn from(err: serde_json::Error) -> Self {
        SeqsumError::Serialization(err)
    }
}

impl From<std::io::Error> for SeqsumError {
    fn from(err: std::io::Error) -> Self {
        SeqsumError::Io(err)
    }
}

impl From<String> for SeqsumError {
    fn from(err: String) -> Self {
        SeqsumError::Other(err)
    }
}

impl From<&str> for SeqsumError {
    fn from(err: &str) -> Self {
        SeqsumError::Other(err.to_string())
    }
}
