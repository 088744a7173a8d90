//! Load xtc trajectories into a dense coordinate array, and write such arrays back out.
//!
//! The dense array is a flat sequence of `f64` indexed `[atom, dimension, frame]` with the atom
//! varying fastest, see [`DenseTrajectory`]. Loading happens in two full passes over the file:
//! the first determines how many frames there are, the second fills the allocated array.
//!
//! ```no_run
//! let dense = xtcdense::load("traj.xtc")?;
//! let (coords, [natoms, _, nframes]) = dense.into_raw();
//! let report = xtcdense::write("copy.xtc", &coords, natoms, nframes)?;
//! assert!(report.is_ok());
//! # Ok::<(), xtcdense::Error>(())
//! ```
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::{Mat3, Vec3};

use crate::reader::{
    read_boxvec, read_compressed_positions, read_f32, read_f32s, read_i32, resize_positions,
};
use crate::writer::{write_compressed_positions, write_f32, write_f32s};

pub use crate::adapter::Adapter;
pub use crate::codec::{Codec, FrameRead, FrameWrite, ReadStatus, XtcCodec};
pub use crate::dense::{DenseTrajectory, DIMENSIONS};
pub use crate::error::{Error, Result};
pub use crate::options::{FrameTemplate, Options, ScanMode};
pub use crate::reader::padding;
pub use crate::store::WriteReport;

mod adapter;
pub mod codec;
pub mod dense;
mod error;
mod load;
mod options;
mod probe;
pub mod reader;
mod store;
mod writer;

/// The box vectors of a frame, stored as the columns of a matrix.
pub type BoxVec = Mat3;

#[derive(Debug, Default, Clone)]
pub struct Frame {
    /// The integration step. It is stored as a signed 32-bit integer, and steps beyond
    /// `i32::MAX` wrap around to negative values on the wire.
    pub step: u32,
    /// Time in picoseconds.
    pub time: f32,
    pub boxvec: BoxVec,
    /// Precision of the compressed positions.
    ///
    /// Frames of at most nine atoms are stored uncompressed, and read with a precision of zero.
    pub precision: f32,
    pub positions: Vec<f32>,
}

impl Frame {
    /// Create a [`Frame`] with room for `natoms` positions, all at the origin.
    pub fn with_natoms(natoms: usize) -> Self {
        Self {
            positions: vec![0.0; natoms * 3],
            ..Self::default()
        }
    }

    /// Returns the number of atoms in this [`Frame`].
    pub fn natoms(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn coords(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.positions.chunks_exact(3).map(Vec3::from_slice)
    }
}

/// The header that precedes the positions of every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub magic: i32,
    pub natoms: usize,
    pub step: u32,
    pub time: f32,
    pub boxvec: BoxVec,
    pub natoms_repeated: usize,
}

impl Header {
    pub const MAGIC: i32 = 1995;
    /// Size of the header in bytes.
    pub const SIZE: usize = 4 * (4 + 9 + 1);

    fn for_frame(frame: &Frame) -> Self {
        let natoms = frame.natoms();
        Self {
            magic: Self::MAGIC,
            natoms,
            step: frame.step,
            time: frame.time,
            boxvec: frame.boxvec,
            natoms_repeated: natoms,
        }
    }

    /// Returns the big-endian encoding of this [`Header`].
    ///
    /// Fails if an atom count does not fit in an `i32`.
    pub fn to_be_bytes(&self) -> io::Result<[u8; Self::SIZE]> {
        let count = |natoms: usize| {
            i32::try_from(natoms).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("natoms ({natoms}) must fit in an i32"),
                )
            })
        };
        let natoms = count(self.natoms)?;
        let natoms_repeated = count(self.natoms_repeated)?;
        let step = self.step as i32;
        let mut bytes = [0; Self::SIZE];
        let values = [self.magic.to_be_bytes(), natoms.to_be_bytes(), step.to_be_bytes()]
            .into_iter()
            .chain([self.time.to_be_bytes()])
            .chain(self.boxvec.to_cols_array().map(f32::to_be_bytes))
            .chain([natoms_repeated.to_be_bytes()]);
        for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value);
        }
        Ok(bytes)
    }
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn read_count<R: Read>(file: &mut R, what: &str) -> io::Result<usize> {
    let value = read_i32(file)?;
    usize::try_from(value).map_err(|_| invalid_data(format!("{what} must be positive, found {value}")))
}

fn check_magic(magic: i32) -> io::Result<()> {
    if magic == Header::MAGIC {
        Ok(())
    } else {
        Err(invalid_data(format!(
            "found invalid magic number '{magic}' ({magic:#0x})"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct XTCReader<R> {
    pub file: R,
    step: usize,
    scratch: Vec<u8>,
}

impl XTCReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> XTCReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            file: reader,
            step: 0,
            scratch: Vec::new(),
        }
    }

    /// Read the magic number and atom count at the start of the next frame.
    ///
    /// Returns `Ok(None)` if the stream is already at its end. The reader is left in the middle of
    /// a frame, so this is only useful to peek at the start of a file.
    pub fn read_natoms(&mut self) -> io::Result<Option<usize>> {
        let Some(magic) = reader::read_i32_or_eof(&mut self.file)? else {
            return Ok(None);
        };
        check_magic(magic)?;
        read_count(&mut self.file, "natoms").map(Some)
    }

    /// Read the [`Header`] of the next frame, or `Ok(None)` at the end of the stream.
    pub fn read_header(&mut self) -> io::Result<Option<Header>> {
        let file = &mut self.file;
        let Some(magic) = reader::read_i32_or_eof(file)? else {
            return Ok(None);
        };
        check_magic(magic)?;
        let natoms = read_count(file, "natoms")?;
        let step = read_i32(file)? as u32;
        let time = read_f32(file)?;
        let boxvec = read_boxvec(file)?;
        let natoms_repeated = read_count(file, "natoms")?;
        if natoms != natoms_repeated {
            return Err(invalid_data(format!(
                "the atom counts in the header disagree ({natoms} != {natoms_repeated})"
            )));
        }

        Ok(Some(Header {
            magic,
            natoms,
            step,
            time,
            boxvec,
            natoms_repeated,
        }))
    }

    /// Reads the next [`Frame`] and advances one step.
    ///
    /// Returns [`ReadStatus::EndOfStream`] if the stream ends cleanly before the next frame. A
    /// stream that ends within a frame is an error.
    pub fn read_frame(&mut self, frame: &mut Frame) -> io::Result<ReadStatus> {
        self.read_frame_inner(frame, None)
    }

    /// Reads the next [`Frame`], requiring that it holds exactly `natoms` atoms.
    pub fn read_frame_expecting(
        &mut self,
        frame: &mut Frame,
        natoms: usize,
    ) -> io::Result<ReadStatus> {
        self.read_frame_inner(frame, Some(natoms))
    }

    /// A convenience function to read all frames in a trajectory.
    ///
    /// It is likely more efficient to use [`XTCReader::read_frame`] if you are only interested in
    /// the values of a single frame at a time.
    pub fn read_all_frames(&mut self) -> io::Result<Box<[Frame]>> {
        let mut frames = Vec::new();
        loop {
            let mut frame = Frame::default();
            match self.read_frame(&mut frame)? {
                ReadStatus::Frame => frames.push(frame),
                ReadStatus::EndOfStream => break,
            }
        }
        Ok(frames.into_boxed_slice())
    }

    fn read_frame_inner(
        &mut self,
        frame: &mut Frame,
        expected: Option<usize>,
    ) -> io::Result<ReadStatus> {
        let Some(header) = self.read_header()? else {
            return Ok(ReadStatus::EndOfStream);
        };
        let natoms = header.natoms;
        if let Some(expected) = expected {
            if natoms != expected {
                return Err(invalid_data(format!(
                    "frame {} holds {natoms} atoms where {expected} were expected",
                    self.step
                )));
            }
        }

        let file = &mut self.file;
        if natoms <= 9 {
            // In case the number of atoms is very small, the positions are stored uncompressed.
            resize_positions(&mut frame.positions, natoms)?;
            read_f32s(file, &mut frame.positions)?;
            frame.precision = 0.0;
        } else {
            // The positions are only sized once the compressed data shows they can be filled.
            frame.precision = read_f32(file)?;
            read_compressed_positions(
                file,
                natoms,
                &mut frame.positions,
                frame.precision,
                &mut self.scratch,
            )?;
        }

        self.step += 1;

        frame.step = header.step;
        frame.time = header.time;
        frame.boxvec = header.boxvec;

        Ok(ReadStatus::Frame)
    }
}

#[derive(Debug)]
pub struct XTCWriter<W: Write> {
    pub file: W,
    buffer: Vec<u8>,
    scratch: writer::EncodeScratch,
}

impl XTCWriter<BufWriter<File>> {
    /// Create a new file at `path`, truncating it if it exists.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> XTCWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            file: writer,
            buffer: Vec::new(),
            scratch: Default::default(),
        }
    }

    /// Encodes and writes a [`Frame`].
    ///
    /// The frame is encoded completely before any of it is written, so a frame that cannot be
    /// encoded leaves the stream untouched.
    pub fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidInput, msg);
        if frame.positions.len() % 3 != 0 {
            return Err(invalid(format!(
                "the number of position values ({}) must be divisible by 3",
                frame.positions.len()
            )));
        }
        let natoms = frame.natoms();
        let header = Header::for_frame(frame).to_be_bytes()?;

        let buffer = &mut self.buffer;
        buffer.clear();
        buffer.extend_from_slice(&header);
        if natoms <= 9 {
            write_f32s(buffer, &frame.positions)?;
        } else {
            if !(frame.precision > 0.0) {
                return Err(invalid(format!(
                    "precision must be positive, found {}",
                    frame.precision
                )));
            }
            write_f32(buffer, frame.precision)?;
            write_compressed_positions(
                buffer,
                &frame.positions,
                frame.precision,
                &mut self.scratch,
            )?;
        }

        self.file.write_all(&self.buffer)
    }

    /// Flush the writer and return the inner stream.
    pub fn finish(mut self) -> io::Result<W> {
        self.file.flush()?;
        Ok(self.file)
    }
}

/// Returns the number of atoms in the trajectory at `path`.
///
/// Only the header of the first frame is read. An empty file holds zero atoms.
pub fn probe_atom_count(path: impl AsRef<Path>) -> Result<usize> {
    Adapter::<XtcCodec>::default().probe_atom_count(path)
}

/// Returns the number of frames in the trajectory at `path` by reading through all of them.
pub fn probe_frame_count(path: impl AsRef<Path>) -> Result<usize> {
    Adapter::<XtcCodec>::default().probe_frame_count(path)
}

/// Load the trajectory at `path` into a [`DenseTrajectory`].
pub fn load(path: impl AsRef<Path>) -> Result<DenseTrajectory> {
    Adapter::<XtcCodec>::default().load(path)
}

/// Write a dense coordinate array of `natoms` atoms and `nframes` frames to `path`.
pub fn write(
    path: impl AsRef<Path>,
    coords: &[f64],
    natoms: usize,
    nframes: usize,
) -> Result<WriteReport> {
    Adapter::<XtcCodec>::default().write(path, coords, natoms, nframes)
}
