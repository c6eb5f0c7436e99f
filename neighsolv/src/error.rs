use neighsolv_packets::FormatError;
use std::io;
use thiserror::Error;

/// Everything that can cut a resolution short.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The packet socket could not be created or bound.
    #[error("failed to open packet socket: {0}")]
    Open(#[source] io::Error),
    /// An interface query (address list, hardware address) failed.
    #[error("failed to read interface state: {0}")]
    Interface(#[source] io::Error),
    /// The interface carries no address usable as the query's source.
    #[error("no usable source address on the interface")]
    NoSourceAddr,
    /// Every attempt ran out before a matching reply arrived.
    #[error("no matching reply after all attempts")]
    Timeout,
    /// A frame buffer could not be built or interpreted.
    #[error(transparent)]
    Format(#[from] FormatError),
}
