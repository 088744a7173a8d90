use std::cell::RefCell;
use std::io;
use std::path::Path;
use std::rc::Rc;

use xtcdense::{
    Adapter, BoxVec, Codec, Error, Frame, FrameRead, FrameTemplate, FrameWrite, Header, Options,
    ReadStatus, ScanMode, XTCReader, XtcCodec,
};

mod common;
use common::Scratch;

/// A dense array of `natoms` atoms and `nframes` frames with distinct, compressible values.
fn dense(natoms: usize, nframes: usize) -> Vec<f64> {
    let mut coords = vec![0.0; natoms * 3 * nframes];
    for frame in 0..nframes {
        for atom in 0..natoms {
            let position = common::position(atom, frame);
            for dim in 0..3 {
                coords[atom + natoms * dim + natoms * 3 * frame] = position[dim] as f64;
            }
        }
    }
    coords
}

#[test]
fn round_trip() -> xtcdense::Result<()> {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("round_trip.xtc");
    let (natoms, nframes) = (57, 4);
    let coords = dense(natoms, nframes);

    let report = xtcdense::write(&path, &coords, natoms, nframes)?;
    assert!(report.is_ok());
    assert_eq!(report.nframes(), nframes);

    let loaded = xtcdense::load(&path)?;
    assert_eq!(loaded.shape(), [natoms, 3, nframes]);
    for (a, b) in coords.iter().zip(loaded.as_slice()) {
        common::assert_close(*a, *b, "round trip");
    }

    // A second trip does not drift any further.
    let again = scratch.path("again.xtc");
    let (raw, [natoms, _, nframes]) = loaded.clone().into_raw();
    assert!(xtcdense::write(&again, &raw, natoms, nframes)?.is_ok());
    assert_eq!(xtcdense::load(&again)?, loaded);
    Ok(())
}

#[test]
fn round_trip_uncompressed() -> xtcdense::Result<()> {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("small.xtc");
    let coords: Vec<f64> = (0..2 * 3 * 5).map(|v| v as f64 * 0.25 - 3.0).collect();

    assert!(xtcdense::write(&path, &coords, 2, 5)?.is_ok());
    let loaded = xtcdense::load(&path)?;
    assert_eq!(loaded.as_slice(), coords);
    Ok(())
}

#[test]
fn frame_metadata() -> xtcdense::Result<()> {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("metadata.xtc");
    xtcdense::write(&path, &dense(12, 3), 12, 3)?;

    let mut reader = XTCReader::open(&path).unwrap();
    let frames = reader.read_all_frames().unwrap();
    let steps: Vec<_> = frames.iter().map(|frame| frame.step).collect();
    assert_eq!(steps, [1, 2, 3]);
    for frame in frames.iter() {
        assert_eq!(frame.time, 0.0);
        assert_eq!(frame.boxvec, BoxVec::ZERO);
        assert_eq!(frame.precision, 1000.0);
    }
    Ok(())
}

#[test]
fn custom_template() -> xtcdense::Result<()> {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("template.xtc");
    let template = FrameTemplate {
        first_step: 100,
        time: 2.5,
        boxvec: BoxVec::IDENTITY * 3.0,
        precision: 100.0,
    };
    let options = Options {
        template,
        ..Options::default()
    };
    Adapter::with_options(XtcCodec, options).write(&path, &dense(20, 2), 20, 2)?;

    let mut reader = XTCReader::open(&path).unwrap();
    let frames = reader.read_all_frames().unwrap();
    assert_eq!(frames[0].step, 100);
    assert_eq!(frames[1].step, 101);
    assert_eq!(frames[1].time, 2.5);
    assert_eq!(frames[1].boxvec, template.boxvec);
    assert_eq!(frames[1].precision, 100.0);
    Ok(())
}

#[test]
fn steps_past_the_signed_range() -> xtcdense::Result<()> {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("steps.xtc");
    let options = Options {
        template: FrameTemplate {
            first_step: i32::MAX as u32,
            ..FrameTemplate::default()
        },
        ..Options::default()
    };
    let report = Adapter::with_options(XtcCodec, options).write(&path, &dense(3, 2), 3, 2)?;
    assert!(report.is_ok());

    let mut reader = XTCReader::open(&path).unwrap();
    let frames = reader.read_all_frames().unwrap();
    assert_eq!(frames[0].step, i32::MAX as u32);
    assert_eq!(frames[1].step, i32::MAX as u32 + 1);
    assert_eq!(frames[1].step as i32, i32::MIN);
    Ok(())
}

#[test]
fn header_with_too_many_atoms() {
    let header = Header {
        magic: Header::MAGIC,
        natoms: i32::MAX as usize + 1,
        step: 0,
        time: 0.0,
        boxvec: BoxVec::ZERO,
        natoms_repeated: i32::MAX as usize + 1,
    };
    let err = header.to_be_bytes().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}

#[test]
fn invalid_dimensions() {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("invalid.xtc");

    let result = xtcdense::write(&path, &[0.0; 17], 2, 3);
    assert!(matches!(
        result,
        Err(Error::InvalidDimensions {
            len: 17,
            natoms: 2,
            nframes: 3
        })
    ));
    assert!(!path.exists(), "no file should be created");

    let overflowing = xtcdense::write(&path, &[], usize::MAX, 2);
    assert!(matches!(overflowing, Err(Error::InvalidDimensions { .. })));
    assert!(!path.exists());
}

#[test]
fn zero_frames() -> xtcdense::Result<()> {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("zero.xtc");

    let report = xtcdense::write(&path, &[], 5, 0)?;
    assert!(report.is_ok());
    assert!(report.status().is_ok());
    assert_eq!(report.nframes(), 0);
    assert!(path.exists());

    assert_eq!(xtcdense::probe_frame_count(&path)?, 0);
    let loaded = xtcdense::load(&path)?;
    assert!(loaded.as_slice().is_empty());
    Ok(())
}

#[test]
fn unwritable_path() {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("no/such/directory.xtc");
    assert!(matches!(
        xtcdense::write(&path, &dense(3, 1), 3, 1),
        Err(Error::StreamUnwritable { .. })
    ));
}

#[test]
fn unrepresentable_frame_is_skipped() -> xtcdense::Result<()> {
    let scratch = Scratch::new().unwrap();
    let path = scratch.path("skipped.xtc");
    let (natoms, nframes) = (15, 3);
    let mut coords = dense(natoms, nframes);
    // Too far out to be stored at this precision.
    coords[natoms * 3] = 1e12;

    let report = xtcdense::write(&path, &coords, natoms, nframes)?;
    assert!(!report.is_ok());
    assert!(report.status().is_ok(), "the last frame was written");
    let failures: Vec<_> = report.failures().map(|(index, _)| index).collect();
    assert_eq!(failures, [1]);

    // The failed frame left nothing behind, the frames around it are intact.
    let loaded = xtcdense::load(&path)?;
    assert_eq!(loaded.shape(), [natoms, 3, 2]);
    let mut reader = XTCReader::open(&path).unwrap();
    let steps: Vec<_> = reader
        .read_all_frames()
        .unwrap()
        .iter()
        .map(|frame| frame.step)
        .collect();
    assert_eq!(steps, [1, 3]);
    Ok(())
}

/// Keeps frames in memory, and fails to write the frames at the given indices.
#[derive(Debug, Default, Clone)]
struct MemoryCodec {
    frames: Rc<RefCell<Vec<Frame>>>,
    fail_writes: Vec<usize>,
    fail_read: Option<usize>,
}

struct MemoryReader {
    frames: Vec<Frame>,
    cursor: usize,
    fail_read: Option<usize>,
}

struct MemoryWriter {
    frames: Rc<RefCell<Vec<Frame>>>,
    attempts: usize,
    fail_writes: Vec<usize>,
}

impl Codec for MemoryCodec {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn read_natoms(&self, _path: &Path) -> io::Result<usize> {
        Ok(self.frames.borrow().first().map_or(0, Frame::natoms))
    }

    fn open_read(&self, _path: &Path) -> io::Result<Self::Reader> {
        Ok(MemoryReader {
            frames: self.frames.borrow().clone(),
            cursor: 0,
            fail_read: self.fail_read,
        })
    }

    fn open_write(&self, _path: &Path) -> io::Result<Self::Writer> {
        self.frames.borrow_mut().clear();
        Ok(MemoryWriter {
            frames: Rc::clone(&self.frames),
            attempts: 0,
            fail_writes: self.fail_writes.clone(),
        })
    }
}

impl FrameRead for MemoryReader {
    fn read_frame(&mut self, natoms: usize, frame: &mut Frame) -> io::Result<ReadStatus> {
        if self.fail_read == Some(self.cursor) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad frame"));
        }
        let Some(next) = self.frames.get(self.cursor) else {
            return Ok(ReadStatus::EndOfStream);
        };
        assert_eq!(next.natoms(), natoms);
        frame.clone_from(next);
        self.cursor += 1;
        Ok(ReadStatus::Frame)
    }
}

impl FrameWrite for MemoryWriter {
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.fail_writes.contains(&attempt) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.frames.borrow_mut().push(frame.clone());
        Ok(())
    }

    fn finish(self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn failed_writes_do_not_stop_later_frames() -> xtcdense::Result<()> {
    let codec = MemoryCodec {
        fail_writes: vec![0, 2],
        ..MemoryCodec::default()
    };
    let adapter = Adapter::new(codec.clone());
    let report = adapter.write("memory", &dense(4, 5), 4, 5)?;

    assert_eq!(report.nframes(), 5);
    let failures: Vec<_> = report.failures().map(|(index, _)| index).collect();
    assert_eq!(failures, [0, 2]);
    assert!(report.status().is_ok());
    assert!(!report.is_ok());

    let steps: Vec<_> = codec.frames.borrow().iter().map(|frame| frame.step).collect();
    assert_eq!(steps, [2, 4, 5]);
    Ok(())
}

#[test]
fn last_failure_is_the_status() -> xtcdense::Result<()> {
    let codec = MemoryCodec {
        fail_writes: vec![2],
        ..MemoryCodec::default()
    };
    let report = Adapter::new(codec).write("memory", &dense(4, 3), 4, 3)?;
    assert_eq!(report.status().unwrap_err().kind(), io::ErrorKind::Other);
    Ok(())
}

#[test]
fn memory_round_trip() -> xtcdense::Result<()> {
    let adapter = Adapter::new(MemoryCodec::default());
    let coords = dense(3, 4);
    assert!(adapter.write("memory", &coords, 3, 4)?.is_ok());

    let loaded = adapter.load("memory")?;
    assert_eq!(loaded.shape(), [3, 3, 4]);
    for (a, b) in coords.iter().zip(loaded.as_slice()) {
        assert_eq!(*a as f32 as f64, *b);
    }
    Ok(())
}

#[test]
fn read_failure_during_scan() -> xtcdense::Result<()> {
    let mut codec = MemoryCodec::default();
    Adapter::new(codec.clone()).write("memory", &dense(3, 4), 3, 4)?;
    codec.fail_read = Some(2);

    let lenient = Adapter::new(codec.clone());
    assert_eq!(lenient.probe_frame_count("memory")?, 2);
    assert_eq!(lenient.load("memory")?.shape(), [3, 3, 2]);

    let options = Options {
        scan: ScanMode::Strict,
        ..Options::default()
    };
    let strict = Adapter::with_options(codec, options);
    assert!(matches!(
        strict.load("memory"),
        Err(Error::CorruptFrame { frame: 2, .. })
    ));
    Ok(())
}
