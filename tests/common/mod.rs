#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use xtcdense::{Frame, XTCWriter};

/// A temporary directory that trajectories can be written into.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Returns the position of `atom` in `frame` of the test trajectories.
///
/// The values are on a 0.001 grid so that they survive compression at precision 1000.
pub fn position(atom: usize, frame: usize) -> [f32; 3] {
    let a = atom as f32;
    let f = frame as f32;
    [
        0.5 + 0.125 * a + 0.25 * f,
        1.0 + 0.002 * a * a - 0.5 * f,
        (a % 7.0) * 0.375 + 0.001 * f,
    ]
}

/// Build frame `index` of a test trajectory of `natoms` atoms.
pub fn frame(natoms: usize, index: usize) -> Frame {
    let positions = (0..natoms).flat_map(|atom| position(atom, index)).collect();
    Frame {
        step: index as u32 * 10,
        time: index as f32 * 0.5,
        boxvec: xtcdense::BoxVec::from_diagonal(glam::Vec3::splat(4.0)),
        precision: 1000.0,
        positions,
    }
}

/// Write a trajectory of `nframes` frames of `natoms` atoms to `path`.
pub fn write_trajectory(path: &Path, natoms: usize, nframes: usize) -> std::io::Result<()> {
    let mut writer = XTCWriter::create(path)?;
    for index in 0..nframes {
        writer.write_frame(&frame(natoms, index))?;
    }
    writer.finish()?;
    Ok(())
}

/// Cut the file at `path` short by `nbytes`.
pub fn truncate(path: &Path, nbytes: u64) -> std::io::Result<()> {
    let len = std::fs::metadata(path)?.len();
    let file = std::fs::OpenOptions::new().write(true).open(path)?;
    file.set_len(len - nbytes)
}

/// Append `bytes` to the file at `path`.
pub fn append(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
    file.write_all(bytes)
}

/// Assert that two values agree up to the resolution of a compressed position.
pub fn assert_close(a: f64, b: f64, what: &str) {
    assert!((a - b).abs() <= 0.0011, "{what}: {a} and {b} differ");
}

/// Overwrite the bytes at `offset` in the file at `path`.
pub fn patch(path: &Path, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::{Seek, SeekFrom};
    let mut file = std::fs::OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)
}

/// Returns the encoded header of a frame of `natoms` atoms.
pub fn header(natoms: usize) -> Vec<u8> {
    xtcdense::Header {
        magic: xtcdense::Header::MAGIC,
        natoms,
        step: 0,
        time: 0.0,
        boxvec: xtcdense::BoxVec::ZERO,
        natoms_repeated: natoms,
    }
    .to_be_bytes()
    .unwrap()
    .to_vec()
}
