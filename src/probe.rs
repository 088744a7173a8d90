//! Determining how large the dense array for a stream must be.
use std::path::Path;

use log::{debug, warn};

use crate::adapter::Adapter;
use crate::codec::{Codec, FrameRead, ReadStatus};
use crate::error::{Error, Result};
use crate::options::ScanMode;
use crate::Frame;

/// Whether a scan should go on after an attempted read.
pub(crate) enum Advance {
    Frame,
    Terminated,
}

impl<C: Codec> Adapter<C> {
    /// Returns the number of atoms in the stream at `path`.
    pub fn probe_atom_count(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let natoms = self
            .codec()
            .read_natoms(path)
            .map_err(|source| Error::StreamUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("'{}' holds {natoms} atoms", path.display());
        Ok(natoms)
    }

    /// Returns the number of frames in the stream at `path` by reading all of them.
    ///
    /// In [`ScanMode::Lenient`] a frame that fails to read ends the count, so a truncated stream
    /// reports the number of complete frames before the damage.
    pub fn probe_frame_count(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let natoms = self.probe_atom_count(path)?;
        self.count_frames(path, natoms)
    }

    /// Count the frames of `natoms` atoms in the stream at `path`.
    ///
    /// Like [`Adapter::probe_frame_count`], but with an atom count that is already known.
    pub fn count_frames(&self, path: impl AsRef<Path>, natoms: usize) -> Result<usize> {
        let path = path.as_ref();
        let mut reader = self.open_read(path)?;
        let mut frame = Frame::default();
        let mut nframes = 0;
        while let Advance::Frame = self.advance(&mut reader, path, natoms, nframes, &mut frame)? {
            nframes += 1;
        }
        debug!("'{}' holds {nframes} frames", path.display());
        Ok(nframes)
    }

    pub(crate) fn open_read(&self, path: &Path) -> Result<C::Reader> {
        self.codec()
            .open_read(path)
            .map_err(|source| Error::StreamUnreadable {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Attempt to read frame number `index` from `reader`.
    pub(crate) fn advance(
        &self,
        reader: &mut C::Reader,
        path: &Path,
        natoms: usize,
        index: usize,
        frame: &mut Frame,
    ) -> Result<Advance> {
        match reader.read_frame(natoms, frame) {
            Ok(ReadStatus::Frame) => Ok(Advance::Frame),
            Ok(ReadStatus::EndOfStream) => Ok(Advance::Terminated),
            Err(source) => match self.options().scan {
                ScanMode::Lenient => {
                    warn!(
                        "stopped reading '{}' at frame {index}: {source}",
                        path.display()
                    );
                    Ok(Advance::Terminated)
                }
                ScanMode::Strict => Err(Error::CorruptFrame {
                    path: path.to_path_buf(),
                    frame: index,
                    source,
                }),
            },
        }
    }
}
