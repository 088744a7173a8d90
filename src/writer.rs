use std::io::{self, Write};

use crate::reader::{calc_sizeint, padding, FIRSTIDX, LASTIDX, MAGICINTS};

/// Largest magnitude a scaled coordinate may have before the integer conversion overflows.
const MAXABS: f32 = (i32::MAX - 2) as f32;

/// Reusable allocations for compressing the positions of a frame.
#[derive(Debug, Default, Clone)]
pub(crate) struct EncodeScratch {
    ints: Vec<i32>,
    bits: Vec<u8>,
}

struct EncodeState<'b> {
    buf: &'b mut Vec<u8>,
    lastbits: u32,
    lastbyte: u32,
}

impl<'b> EncodeState<'b> {
    fn new(buf: &'b mut Vec<u8>) -> Self {
        buf.clear();
        Self {
            buf,
            lastbits: 0,
            lastbyte: 0,
        }
    }

    /// Flush the partially filled last byte, if any, and return the number of bytes written.
    fn finish(self) -> usize {
        if self.lastbits > 0 {
            self.buf.push((self.lastbyte << (8 - self.lastbits)) as u8);
        }
        self.buf.len()
    }
}

fn invalid_input(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.into())
}

/// Compress `positions` and write the compressed section of a frame.
///
/// This is the counterpart of `read_compressed_positions`: it writes the integer bounds, the
/// initial small index and the opaque bit stream, but not the precision that precedes them.
pub(crate) fn write_compressed_positions<W: Write>(
    file: &mut W,
    positions: &[f32],
    precision: f32,
    scratch: &mut EncodeScratch,
) -> io::Result<()> {
    if positions.len() % 3 != 0 {
        return Err(invalid_input(
            "the number of position values must be divisible by 3",
        ));
    }
    let natoms = positions.len() / 3;

    let ints = &mut scratch.ints;
    ints.clear();
    let mut minint = [i32::MAX; 3];
    let mut maxint = [i32::MIN; 3];
    let mut mindiff = i64::from(i32::MAX);
    let mut old = [0i32; 3];
    for (idx, position) in positions.chunks_exact(3).enumerate() {
        let mut lint = [0i32; 3];
        for j in 0..3 {
            let value = position[j];
            let scaled = value * precision;
            let lf = if value >= 0.0 {
                (scaled as f64 + 0.5) as f32
            } else {
                (scaled as f64 - 0.5) as f32
            };
            // Also rejects NaN.
            if !(lf.abs() <= MAXABS) {
                return Err(invalid_input(format!(
                    "position {idx} ({value}) cannot be stored at precision {precision}"
                )));
            }
            lint[j] = lf as i32;
            minint[j] = minint[j].min(lint[j]);
            maxint[j] = maxint[j].max(lint[j]);
        }
        ints.extend_from_slice(&lint);

        let diff: i64 = (0..3).map(|j| (old[j] as i64 - lint[j] as i64).abs()).sum();
        if idx > 0 && diff < mindiff {
            mindiff = diff;
        }
        old = lint;
    }

    for j in 0..3 {
        if maxint[j] as i64 - minint[j] as i64 >= MAXABS as i64 {
            return Err(invalid_input(
                "the range of positions is too large to be stored at this precision",
            ));
        }
    }
    write_i32s(file, &minint)?;
    write_i32s(file, &maxint)?;

    let mut sizeint = [0u32; 3];
    let mut bitsizeint = [0u32; 3];
    let bitsize = calc_sizeint(minint, maxint, &mut sizeint, &mut bitsizeint);

    let mut smallidx = FIRSTIDX;
    while smallidx < LASTIDX - 1 && (MAGICINTS[smallidx] as i64) < mindiff {
        smallidx += 1;
    }
    write_u32(file, smallidx as u32)?;

    let maxidx = usize::min(LASTIDX - 1, smallidx + 8);
    let minidx = maxidx - 8;
    let mut smaller = MAGICINTS[usize::max(FIRSTIDX, smallidx - 1)] / 2;
    let mut smallnum = MAGICINTS[smallidx] / 2;
    let mut sizesmall = [MAGICINTS[smallidx] as u32; 3];
    let larger = MAGICINTS[maxidx] / 2;

    let mut state = EncodeState::new(&mut scratch.bits);
    let mut prevcoord = [0i32; 3];
    let mut prevrun: i32 = -1;
    let mut tmpcoord = [0u32; 8 * 3];
    let mut i = 0;
    while i < natoms {
        let this = i * 3;
        let mut is_small = false;
        let mut is_smaller: i32 = if smallidx < maxidx
            && i >= 1
            && is_within(&ints[this..this + 3], &prevcoord, larger)
        {
            1
        } else if smallidx > minidx {
            -1
        } else {
            0
        };

        if i + 1 < natoms && is_within(&ints[this..this + 3], &ints[this + 3..this + 6], smallnum)
        {
            // Interchange the first and second atom, which compresses water molecules better.
            for j in 0..3 {
                ints.swap(this + j, this + 3 + j);
            }
            is_small = true;
        }

        let coord = [ints[this], ints[this + 1], ints[this + 2]];
        let tmp = [0, 1, 2].map(|j| coord[j].wrapping_sub(minint[j]) as u32);
        if bitsize == 0 {
            sendbits(&mut state, bitsizeint[0], tmp[0]);
            sendbits(&mut state, bitsizeint[1], tmp[1]);
            sendbits(&mut state, bitsizeint[2], tmp[2]);
        } else {
            sendints(&mut state, bitsize, sizeint, tmp);
        }
        prevcoord = coord;
        i += 1;

        let mut run = 0;
        if !is_small && is_smaller == -1 {
            is_smaller = 0;
        }
        while is_small && run < 8 * 3 {
            let this = i * 3;
            let coord = [ints[this], ints[this + 1], ints[this + 2]];
            let tmpsum: i64 = (0..3)
                .map(|j| {
                    let d = coord[j] as i64 - prevcoord[j] as i64;
                    d * d
                })
                .sum();
            // Are we doing small enough steps for water compression?
            if is_smaller == -1 && tmpsum >= smaller as i64 * smaller as i64 {
                is_smaller = 0;
            }

            for j in 0..3 {
                tmpcoord[run] = (coord[j] - prevcoord[j] + smallnum) as u32;
                run += 1;
            }
            prevcoord = coord;
            i += 1;

            is_small = i < natoms && is_within(&ints[i * 3..i * 3 + 3], &prevcoord, smallnum);
        }

        if run as i32 != prevrun || is_smaller != 0 {
            prevrun = run as i32;
            sendbits(&mut state, 1, 1); // Flag the change in run length.
            sendbits(&mut state, 5, (run as i32 + is_smaller + 1) as u32);
        } else {
            sendbits(&mut state, 1, 0); // Run length did not change.
        }
        for k in (0..run).step_by(3) {
            let nums = [tmpcoord[k], tmpcoord[k + 1], tmpcoord[k + 2]];
            sendints(&mut state, smallidx as u32, sizesmall, nums);
        }

        match is_smaller.cmp(&0) {
            std::cmp::Ordering::Less => {
                smallidx -= 1;
                smallnum = smaller;
                if smallidx > FIRSTIDX {
                    smaller = MAGICINTS[smallidx - 1] / 2;
                } else {
                    smaller = 0;
                }
            }
            std::cmp::Ordering::Greater => {
                smallidx += 1;
                smaller = smallnum;
                smallnum = MAGICINTS[smallidx] / 2;
            }
            std::cmp::Ordering::Equal => {}
        }
        sizesmall.fill(MAGICINTS[smallidx] as u32);
    }

    let nbytes = state.finish();
    write_u32(file, nbytes as u32)?;
    file.write_all(&scratch.bits)?;
    file.write_all(&[0; 3][..padding(nbytes)])
}

/// Whether every component of `a` lies strictly within `limit` of the one in `b`.
#[inline]
fn is_within(a: &[i32], b: &[i32], limit: i32) -> bool {
    a.iter()
        .zip(b)
        .all(|(&a, &b)| (a as i64 - b as i64).abs() < limit as i64)
}

fn sendbits(state: &mut EncodeState, mut nbits: u32, num: u32) {
    while nbits >= 8 {
        state.lastbyte = (state.lastbyte << 8) | ((num >> (nbits - 8)) & 0xff);
        state.buf.push((state.lastbyte >> state.lastbits) as u8);
        nbits -= 8;
    }
    if nbits > 0 {
        state.lastbyte = (state.lastbyte << nbits) | (num & ((1 << nbits) - 1));
        state.lastbits += nbits;
        if state.lastbits >= 8 {
            state.lastbits -= 8;
            state.buf.push((state.lastbyte >> state.lastbits) as u8);
        }
    }
}

/// Pack three integers as `(x * sy + y) * sz + z` and send the result in `nbits` bits.
fn sendints(state: &mut EncodeState, nbits: u32, sizes: [u32; 3], nums: [u32; 3]) {
    debug_assert!(
        nums.iter().zip(sizes).skip(1).all(|(&n, s)| n < s),
        "values {nums:?} must lie within their sizes {sizes:?}"
    );
    let packed = (nums[0] as u128 * sizes[1] as u128 + nums[1] as u128) * sizes[2] as u128
        + nums[2] as u128;
    let bytes = packed.to_le_bytes();
    let nbytes = usize::max(1, (128 - packed.leading_zeros() as usize).div_ceil(8));

    if nbits as usize >= nbytes * 8 {
        for &byte in &bytes[..nbytes] {
            sendbits(state, 8, byte as u32);
        }
        sendbits(state, nbits - nbytes as u32 * 8, 0);
    } else {
        for &byte in &bytes[..nbytes - 1] {
            sendbits(state, 8, byte as u32);
        }
        sendbits(
            state,
            nbits - (nbytes as u32 - 1) * 8,
            bytes[nbytes - 1] as u32,
        );
    }
}

pub(crate) fn write_f32s<W: Write>(file: &mut W, values: &[f32]) -> io::Result<()> {
    for &value in values {
        write_f32(file, value)?;
    }
    Ok(())
}

fn write_i32s<W: Write>(file: &mut W, values: &[i32]) -> io::Result<()> {
    for &value in values {
        write_i32(file, value)?;
    }
    Ok(())
}

pub(crate) fn write_f32<W: Write>(file: &mut W, value: f32) -> io::Result<()> {
    file.write_all(&value.to_be_bytes())
}

fn write_i32<W: Write>(file: &mut W, value: i32) -> io::Result<()> {
    file.write_all(&value.to_be_bytes())
}

fn write_u32<W: Write>(file: &mut W, value: u32) -> io::Result<()> {
    file.write_all(&value.to_be_bytes())
}
