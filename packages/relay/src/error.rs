//! リレー全体（起動・停止）のエラー

use thiserror::Error;

use crate::domain::{ChannelError, CollaboratorError, StoreError, ValueObjectError};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("auxiliary store: {0}")]
    Store(#[from] StoreError),

    #[error("cross-instance channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("collaborator setup: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ValueObjectError),
}
