//! The per-frame codec that the dense adapter is built on.
//!
//! A [`Codec`] opens trajectory streams by path and hands out a reader or writer that moves one
//! [`Frame`] at a time. Handles are closed when they are dropped. [`XtcCodec`] is the
//! implementation for xtc files.
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::{Frame, XTCReader, XTCWriter};

/// The outcome of a successful frame read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// A frame was read.
    Frame,
    /// The stream ended cleanly, there are no more frames.
    EndOfStream,
}

/// A stream of frames opened for reading.
pub trait FrameRead {
    /// Read the next frame of `natoms` atoms into `frame`.
    ///
    /// A frame that cannot be read, including one that holds a different number of atoms, is an
    /// error. This is distinct from [`ReadStatus::EndOfStream`].
    fn read_frame(&mut self, natoms: usize, frame: &mut Frame) -> io::Result<ReadStatus>;
}

/// A stream of frames opened for writing.
pub trait FrameWrite {
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()>;

    /// Flush and close the stream.
    ///
    /// Dropping a writer also closes it, but any error while flushing is lost in that case.
    fn finish(self) -> io::Result<()>
    where
        Self: Sized;
}

pub trait Codec {
    type Reader: FrameRead;
    type Writer: FrameWrite;

    /// Returns the number of atoms in the stream at `path`, reading nothing but the header.
    fn read_natoms(&self, path: &Path) -> io::Result<usize>;

    fn open_read(&self, path: &Path) -> io::Result<Self::Reader>;

    /// Create the stream at `path`, replacing any existing contents.
    fn open_write(&self, path: &Path) -> io::Result<Self::Writer>;
}

/// The xtc trajectory format.
#[derive(Debug, Default, Clone, Copy)]
pub struct XtcCodec;

impl Codec for XtcCodec {
    type Reader = XTCReader<BufReader<File>>;
    type Writer = XTCWriter<BufWriter<File>>;

    /// An empty file holds no frames, and is reported to have zero atoms.
    fn read_natoms(&self, path: &Path) -> io::Result<usize> {
        let mut reader = XTCReader::open(path)?;
        Ok(reader.read_natoms()?.unwrap_or(0))
    }

    fn open_read(&self, path: &Path) -> io::Result<Self::Reader> {
        XTCReader::open(path)
    }

    fn open_write(&self, path: &Path) -> io::Result<Self::Writer> {
        XTCWriter::create(path)
    }
}

impl<R: Read> FrameRead for XTCReader<R> {
    fn read_frame(&mut self, natoms: usize, frame: &mut Frame) -> io::Result<ReadStatus> {
        self.read_frame_expecting(frame, natoms)
    }
}

impl<W: Write> FrameWrite for XTCWriter<W> {
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        XTCWriter::write_frame(self, frame)
    }

    fn finish(self) -> io::Result<()> {
        XTCWriter::finish(self).map(drop)
    }
}
