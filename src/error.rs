use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The stream could not be opened, or its header could not be parsed.
    #[error("could not read trajectory '{}': {source}", path.display())]
    StreamUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not create trajectory '{}': {source}", path.display())]
    StreamUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The length of a coordinate array does not match the declared atom and frame counts.
    #[error(
        "an array of {len} values does not hold {natoms} atoms in 3 dimensions for {nframes} frames"
    )]
    InvalidDimensions {
        len: usize,
        natoms: usize,
        nframes: usize,
    },
    /// A frame failed to read during a strict scan.
    #[error("could not read frame {frame} of '{}': {source}", path.display())]
    CorruptFrame {
        path: PathBuf,
        frame: usize,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
