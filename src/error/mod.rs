//! Error handling for the node
//!
//! One error type covers the ledger, the transaction pool, the miner and the
//! peer layer, plus the collaborators (wallet, config, storage) around them.

use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Candidate block does not extend the current tip
    InvalidLink { expected: String, found: String },
    /// Candidate block hash is stale or misses the difficulty target
    InvalidProof { hash: String, difficulty: u32 },
    /// Transaction rejected by the pool
    InvalidTransaction(String),
    /// Peer connect/send failure
    Connection(String),
    /// The chain has no blocks; unreachable once genesis exists
    EmptyChain,
    /// Miner lifecycle errors
    Mining(String),
    /// Chain or wallet file is missing pieces or corrupt
    Storage(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Wallet operation errors
    Wallet(String),
    /// Invalid address format
    InvalidAddress(String),
    /// Configuration errors
    Config(String),
}

impl NodeError {
    /// True for the two ledger rejections a miner treats as a stale round.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            NodeError::InvalidLink { .. } | NodeError::InvalidProof { .. }
        )
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::InvalidLink { expected, found } => {
                write!(
                    f,
                    "Invalid link: expected previous hash {expected}, found {found}"
                )
            }
            NodeError::InvalidProof { hash, difficulty } => {
                write!(f, "Invalid proof: {hash} does not meet difficulty {difficulty}")
            }
            NodeError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            NodeError::Connection(msg) => write!(f, "Connection error: {msg}"),
            NodeError::EmptyChain => write!(f, "Chain is empty"),
            NodeError::Mining(msg) => write!(f, "Mining error: {msg}"),
            NodeError::Storage(msg) => write!(f, "Storage error: {msg}"),
            NodeError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            NodeError::Io(msg) => write!(f, "I/O error: {msg}"),
            NodeError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            NodeError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            NodeError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            NodeError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Io(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for NodeError {
    fn from(err: bincode::error::EncodeError) -> Self {
        NodeError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for NodeError {
    fn from(err: bincode::error::DecodeError) -> Self {
        NodeError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for NodeError {
    fn from(err: toml::de::Error) -> Self {
        NodeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_flagged() {
        let link = NodeError::InvalidLink {
            expected: "aa".to_string(),
            found: "bb".to_string(),
        };
        let proof = NodeError::InvalidProof {
            hash: "ff".to_string(),
            difficulty: 2,
        };
        assert!(link.is_rejection());
        assert!(proof.is_rejection());
        assert!(!NodeError::EmptyChain.is_rejection());
        assert!(!NodeError::Storage("disk full".to_string()).is_rejection());
    }

    #[test]
    fn test_display_messages() {
        let err = NodeError::InvalidProof {
            hash: "abc".to_string(),
            difficulty: 3,
        };
        assert_eq!(
            err.to_string(),
            "Invalid proof: abc does not meet difficulty 3"
        );
        assert_eq!(NodeError::EmptyChain.to_string(), "Chain is empty");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: NodeError = io.into();
        assert!(matches!(err, NodeError::Io(msg) if msg.contains("gone")));
    }
}
