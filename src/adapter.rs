use crate::codec::{Codec, XtcCodec};
use crate::options::Options;

/// Converts between trajectory streams and [`DenseTrajectory`](crate::DenseTrajectory) arrays.
///
/// An adapter holds nothing but its codec and options. Every call opens its own stream and
/// releases it before returning.
#[derive(Debug, Default, Clone)]
pub struct Adapter<C = XtcCodec> {
    codec: C,
    options: Options,
}

impl<C: Codec> Adapter<C> {
    pub fn new(codec: C) -> Self {
        Self::with_options(codec, Options::default())
    }

    pub fn with_options(codec: C, options: Options) -> Self {
        Self { codec, options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}
