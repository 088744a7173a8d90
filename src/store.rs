//! Writing a dense array out as a stream of frames.
use std::io;
use std::path::Path;

use log::{debug, info, warn};

use crate::adapter::Adapter;
use crate::codec::{Codec, FrameWrite};
use crate::dense::{dense_len, gather_frame, DenseTrajectory};
use crate::error::{Error, Result};
use crate::Frame;

/// The outcome of writing every frame of a dense array.
///
/// A frame that fails to write does not stop the frames after it from being written, so any
/// number of frames may have failed.
#[derive(Debug)]
pub struct WriteReport {
    outcomes: Vec<io::Result<()>>,
    close: io::Result<()>,
}

impl WriteReport {
    /// Returns the number of frames that a write was attempted for.
    pub fn nframes(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns the outcome of the last frame write, or success if there were no frames.
    pub fn status(&self) -> std::result::Result<(), &io::Error> {
        match self.outcomes.last() {
            Some(Err(err)) => Err(err),
            _ => Ok(()),
        }
    }

    /// Returns the outcome of each frame write, in frame order.
    pub fn outcomes(&self) -> &[io::Result<()>] {
        &self.outcomes
    }

    /// Returns an iterator over the index and error of each frame that failed to write.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &io::Error)> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| outcome.as_ref().err().map(|err| (index, err)))
    }

    /// Returns the outcome of flushing and closing the stream.
    pub fn close_status(&self) -> std::result::Result<(), &io::Error> {
        self.close.as_ref().map(|_| ())
    }

    /// Returns whether every frame was written and the stream was closed cleanly.
    pub fn is_ok(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.is_ok()) && self.close.is_ok()
    }
}

impl<C: Codec> Adapter<C> {
    /// Write `coords`, a dense array of `natoms` atoms and `nframes` frames, to `path`.
    ///
    /// The dimensions are checked before anything is opened. Each frame is written with the
    /// metadata of the [`FrameTemplate`](crate::FrameTemplate) in the options, with the step
    /// counting up from its first step.
    pub fn write(
        &self,
        path: impl AsRef<Path>,
        coords: &[f64],
        natoms: usize,
        nframes: usize,
    ) -> Result<WriteReport> {
        let path = path.as_ref();
        if dense_len(natoms, nframes) != Some(coords.len()) {
            return Err(Error::InvalidDimensions {
                len: coords.len(),
                natoms,
                nframes,
            });
        }

        let mut writer = self
            .codec()
            .open_write(path)
            .map_err(|source| Error::StreamUnwritable {
                path: path.to_path_buf(),
                source,
            })?;

        let template = &self.options().template;
        let mut frame = Frame {
            time: template.time,
            boxvec: template.boxvec,
            precision: template.precision,
            ..Frame::with_natoms(natoms)
        };
        let mut outcomes = Vec::with_capacity(nframes);
        for index in 0..nframes {
            gather_frame(coords, natoms, index, &mut frame.positions);
            frame.step = template.first_step.wrapping_add(index as u32);
            let outcome = writer.write_frame(&frame);
            if let Err(err) = &outcome {
                warn!(
                    "could not write frame {index} to '{}': {err}",
                    path.display()
                );
            }
            outcomes.push(outcome);
        }
        let close = writer.finish();
        if let Err(err) = &close {
            warn!("could not close '{}': {err}", path.display());
        }

        let report = WriteReport { outcomes, close };
        let failed = report.failures().count();
        if failed == 0 {
            info!(
                "wrote {natoms} atoms over {nframes} frames to '{}'",
                path.display()
            );
        } else {
            debug!("{failed} of {nframes} frames failed to write");
        }
        Ok(report)
    }

    /// Write a [`DenseTrajectory`] to `path`.
    pub fn write_trajectory(
        &self,
        path: impl AsRef<Path>,
        dense: &DenseTrajectory,
    ) -> Result<WriteReport> {
        self.write(path, dense.as_slice(), dense.natoms(), dense.nframes())
    }
}
