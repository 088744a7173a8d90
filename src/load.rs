use std::path::Path;

use log::{debug, info, warn};

use crate::adapter::Adapter;
use crate::codec::Codec;
use crate::dense::DenseTrajectory;
use crate::error::Result;
use crate::probe::Advance;
use crate::Frame;

impl<C: Codec> Adapter<C> {
    /// Load the stream at `path` into a [`DenseTrajectory`].
    ///
    /// The stream is read twice. The first pass counts the frames so that the array can be
    /// allocated at its final size, the second fills it in. If the stream yields fewer frames the
    /// second time, the trailing frames stay zero and [`DenseTrajectory::frames_read`] tells how
    /// many were filled. Frames beyond the counted ones are ignored.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DenseTrajectory> {
        let path = path.as_ref();
        let natoms = self.probe_atom_count(path)?;
        let nframes = self.count_frames(path, natoms)?;

        let mut dense = DenseTrajectory::zeroed(natoms, nframes);
        let mut frame = Frame::default();
        let mut reader = self.open_read(path)?;
        let mut cursor = 0;
        while cursor < nframes {
            match self.advance(&mut reader, path, natoms, cursor, &mut frame)? {
                Advance::Frame => dense.set_frame(cursor, &frame.positions),
                Advance::Terminated => break,
            }
            cursor += 1;
        }
        drop(reader);
        dense.set_frames_read(cursor);

        if cursor < nframes {
            warn!(
                "'{}' yielded {cursor} of {nframes} frames, the remaining frames are zero",
                path.display()
            );
        } else {
            debug!("filled all {nframes} frames from '{}'", path.display());
        }
        info!(
            "loaded {natoms} atoms over {nframes} frames from '{}'",
            path.display()
        );
        Ok(dense)
    }
}
