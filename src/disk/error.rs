use std::io;

use thiserror::Error;

use crate::disk::geometry::Location;

/// Result type alias for disk image operations.
pub type Result<T> = std::result::Result<T, DiskError>;

/// Errors that can be returned from disk image operations.
#[derive(Debug, Error)]
pub enum DiskError {
    /// Track or sector coordinates outside the disk geometry.
    #[error("invalid track or sector ({track},{sector})")]
    InvalidGeometry { track: u8, sector: u8 },

    /// The loaded bytes are not a recognizable disk image.
    #[error("invalid disk image: {0}")]
    InvalidImage(String),

    /// No free sector was available to satisfy an allocation.
    #[error("disk is full")]
    DiskFull,

    /// No directory entry matches the given filename.
    #[error("file not found: {0}")]
    NotFound(String),

    /// A directory entry with the given filename already exists.
    #[error("file already exists: {0}")]
    AlreadyExists(String),

    /// A relative file would need more than six side sectors.
    #[error("relative file needs more than 6 side sectors")]
    RelTooLarge,

    /// A relative file's metadata or side-sector structure is unusable.
    #[error("invalid relative file: {0}")]
    InvalidRel(&'static str),

    /// A sector chain revisited a sector it already passed through.
    #[error("chain loop detected at {0}")]
    ChainLoop(Location),

    /// A sector chain carried a link that cannot be valid.
    #[error("invalid chain link in sector {0}")]
    InvalidChain(Location),

    /// A caller-supplied argument was rejected.
    #[error("{0}")]
    Argument(&'static str),

    /// Host file I/O failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
