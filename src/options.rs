use crate::BoxVec;

/// How a scan over the frames of a stream treats a frame that fails to read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// A failed read ends the scan as if the stream had ended there.
    ///
    /// A truncated or corrupted trajectory yields the frames before the damage.
    #[default]
    Lenient,
    /// A failed read is an error, only a clean end of the stream ends the scan.
    Strict,
}

/// The metadata attached to frames that are written from a dense array.
///
/// The dense array only carries positions. Frame `i` is written with step `first_step + i` and
/// the remaining values as given here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTemplate {
    pub first_step: u32,
    /// Time in picoseconds.
    pub time: f32,
    pub boxvec: BoxVec,
    pub precision: f32,
}

impl Default for FrameTemplate {
    fn default() -> Self {
        Self {
            first_step: 1,
            time: 0.0,
            boxvec: BoxVec::ZERO,
            precision: 1000.0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Options {
    pub scan: ScanMode,
    pub template: FrameTemplate,
}
