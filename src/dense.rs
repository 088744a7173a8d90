//! The dense coordinate array that trajectories are loaded into.
use glam::DVec3;

use crate::error::{Error, Result};

/// The number of spatial dimensions of a position.
pub const DIMENSIONS: usize = 3;

/// Returns the flat index of `(atom, dim, frame)` in a dense array of `natoms` atoms.
///
/// The atom varies fastest, then the dimension, then the frame.
#[inline]
pub const fn flat_index(natoms: usize, atom: usize, dim: usize, frame: usize) -> usize {
    atom + natoms * dim + natoms * DIMENSIONS * frame
}

/// Returns the number of values a dense array of `natoms` atoms and `nframes` frames holds.
///
/// Returns [`None`] if that number overflows.
pub fn dense_len(natoms: usize, nframes: usize) -> Option<usize> {
    natoms.checked_mul(DIMENSIONS)?.checked_mul(nframes)
}

/// The positions of all frames of a trajectory, in a single flat array.
///
/// Logically a three-dimensional array of shape `[natoms, 3, nframes]`, indexed as described by
/// [`flat_index`].
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTrajectory {
    coords: Vec<f64>,
    natoms: usize,
    nframes: usize,
    frames_read: usize,
}

impl DenseTrajectory {
    /// Allocate a zeroed array for `natoms` atoms and `nframes` frames.
    ///
    /// # Panics
    ///
    /// Panics if the size of the array overflows.
    pub fn zeroed(natoms: usize, nframes: usize) -> Self {
        let len = dense_len(natoms, nframes).expect("the size of the dense array overflows");
        Self {
            coords: vec![0.0; len],
            natoms,
            nframes,
            frames_read: 0,
        }
    }

    /// Wrap an existing flat array, checking that its length matches the counts.
    pub fn from_raw(coords: Vec<f64>, natoms: usize, nframes: usize) -> Result<Self> {
        if dense_len(natoms, nframes) != Some(coords.len()) {
            return Err(Error::InvalidDimensions {
                len: coords.len(),
                natoms,
                nframes,
            });
        }
        Ok(Self {
            coords,
            natoms,
            nframes,
            frames_read: nframes,
        })
    }

    pub fn natoms(&self) -> usize {
        self.natoms
    }

    /// Returns the number of frames this array was allocated for.
    pub fn nframes(&self) -> usize {
        self.nframes
    }

    /// Returns the number of frames that were actually filled in.
    ///
    /// For a loaded trajectory this is the number of frames the loader read. It is smaller than
    /// [`DenseTrajectory::nframes`] only if the file changed between counting and loading, in
    /// which case the trailing frames are zero.
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    /// Returns the shape `[natoms, 3, nframes]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.natoms, DIMENSIONS, self.nframes]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.coords
    }

    /// Returns the value for one coordinate, or [`None`] if any index is out of bounds.
    pub fn get(&self, atom: usize, dim: usize, frame: usize) -> Option<f64> {
        if atom >= self.natoms || dim >= DIMENSIONS || frame >= self.nframes {
            return None;
        }
        Some(self.coords[flat_index(self.natoms, atom, dim, frame)])
    }

    /// Returns the position of `atom` in `frame`.
    pub fn position(&self, atom: usize, frame: usize) -> Option<DVec3> {
        Some(DVec3::new(
            self.get(atom, 0, frame)?,
            self.get(atom, 1, frame)?,
            self.get(atom, 2, frame)?,
        ))
    }

    /// Returns an iterator over the positions of all atoms in `frame`.
    ///
    /// The iterator is empty if `frame` is out of bounds.
    pub fn positions(&self, frame: usize) -> impl Iterator<Item = DVec3> + '_ {
        let natoms = if frame < self.nframes { self.natoms } else { 0 };
        (0..natoms).filter_map(move |atom| self.position(atom, frame))
    }

    /// Consume the array, returning the flat coordinates and the shape `[natoms, 3, nframes]`.
    pub fn into_raw(self) -> (Vec<f64>, [usize; 3]) {
        let shape = self.shape();
        (self.coords, shape)
    }

    /// Scatter the interleaved `xyz` positions of a frame into frame slot `frame`.
    pub(crate) fn set_frame(&mut self, frame: usize, positions: &[f32]) {
        debug_assert!(frame < self.nframes);
        let natoms = self.natoms;
        for (atom, position) in positions.chunks_exact(DIMENSIONS).take(natoms).enumerate() {
            for (dim, &value) in position.iter().enumerate() {
                self.coords[flat_index(natoms, atom, dim, frame)] = value as f64;
            }
        }
    }

    pub(crate) fn set_frames_read(&mut self, frames_read: usize) {
        self.frames_read = frames_read;
    }
}

/// Gather frame `frame` of a dense array into interleaved `xyz` single precision positions.
///
/// `coords` must hold at least `frame + 1` frames of `natoms` atoms, and `positions` must hold
/// `natoms * 3` values.
pub(crate) fn gather_frame(coords: &[f64], natoms: usize, frame: usize, positions: &mut [f32]) {
    for (atom, position) in positions.chunks_exact_mut(DIMENSIONS).enumerate() {
        for (dim, value) in position.iter_mut().enumerate() {
            *value = coords[flat_index(natoms, atom, dim, frame)] as f32;
        }
    }
}
