//! Collaborator adapters for Reclaim.
//!
//! The core treats credentials and image blobs as external concerns: it
//! stores only the opaque hash or reference strings these adapters produce.

#![deny(unsafe_code)]

pub mod credentials;
pub mod images;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("credential error: {0}")]
    Credentials(String),

    #[error("image store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image store error: {0}")]
    Storage(String),

    #[error("invalid image reference '{0}'")]
    InvalidReference(String),
}

pub use credentials::{hash_password, verify_password};
pub use images::{ImageStore, LocalImageStore, MemoryImageStore};
