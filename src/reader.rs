use std::io::{self, Read};

use crate::BoxVec;

pub(crate) struct DecodeState {
    count: usize,
    lastbits: usize,
    lastbyte: u8,
}

impl DecodeState {
    pub(crate) const fn new() -> Self {
        Self {
            count: 0,
            lastbits: 0,
            lastbyte: 0,
        }
    }
}

#[rustfmt::skip]
pub const MAGICINTS: [i32; 73] = [
    0,        0,        0,       0,       0,       0,       0,       0,       0,       8,
    10,       12,       16,      20,      25,      32,      40,      50,      64,      80,
    101,      128,      161,     203,     256,     322,     406,     512,     645,     812,
    1024,     1290,     1625,    2048,    2580,    3250,    4096,    5060,    6501,    8192,
    10321,    13003,    16384,   20642,   26007,   32768,   41285,   52015,   65536,   82570,
    104031,   131072,   165140,  208063,  262144,  330280,  416127,  524287,  660561,  832255,
    1048576,  1321122,  1664510, 2097152, 2642245, 3329021, 4194304, 5284491, 6658042, 8388607,
    10568983, 13316085, 16777216
];
pub const FIRSTIDX: usize = 9; // Note that MAGICINTS[FIRSTIDX-1] == 0.
pub const LASTIDX: usize = MAGICINTS.len();

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Read the compressed positions section of a frame of `natoms` atoms into `positions`.
///
/// The reader is expected to sit right after the precision value. `positions` is resized to hold
/// the atoms once the compressed data has been read, and only if that data could describe them.
pub(crate) fn read_compressed_positions<R: Read>(
    file: &mut R,
    natoms: usize,
    positions: &mut Vec<f32>,
    precision: f32,
    scratch: &mut Vec<u8>,
) -> io::Result<()> {
    let invprecision = precision.recip();

    let minint = read_i32s::<_, 3>(file)?;
    let maxint = read_i32s::<_, 3>(file)?;
    let mut smallidx = read_u32(file)? as usize;
    if !(FIRSTIDX..LASTIDX).contains(&smallidx) {
        return Err(invalid(format!("found an invalid small index ({smallidx})")));
    }

    let mut sizeint = [0u32; 3];
    let mut bitsizeint = [0u32; 3];
    let bitsize = calc_sizeint(minint, maxint, &mut sizeint, &mut bitsizeint);
    if sizeint.contains(&0) {
        return Err(invalid("found inverted coordinate bounds"));
    }

    let tmpidx = usize::max(smallidx - 1, FIRSTIDX);
    let mut smaller = MAGICINTS[tmpidx] / 2;
    let mut smallnum = MAGICINTS[smallidx] / 2;
    let mut sizesmall = [MAGICINTS[smallidx] as u32; 3];

    let compressed_data = scratch;
    read_opaque(file, compressed_data)?;
    let buf = compressed_data.as_slice();
    // Every atom takes at least one bit of the compressed data.
    if natoms > buf.len().saturating_mul(8) {
        return Err(invalid(format!(
            "{} bytes of compressed data cannot hold {natoms} atoms",
            buf.len()
        )));
    }
    resize_positions(positions, natoms)?;

    let mut state = DecodeState::new();
    let mut run: i32 = 0;
    let mut write_idx = 0;
    let mut read_idx = 0;
    while read_idx < natoms {
        let mut coord = [0i32; 3];
        if bitsize == 0 {
            coord[0] = decodebits(buf, &mut state, bitsizeint[0] as usize)?;
            coord[1] = decodebits(buf, &mut state, bitsizeint[1] as usize)?;
            coord[2] = decodebits(buf, &mut state, bitsizeint[2] as usize)?;
        } else {
            decodeints(buf, &mut state, bitsize, sizeint, &mut coord)?;
        }

        for (c, min) in coord.iter_mut().zip(minint) {
            *c = c.wrapping_add(min);
        }
        let mut prevcoord = coord;

        let flag = decodebits::<u32>(buf, &mut state, 1)? > 0;
        let mut is_smaller = 0;
        if flag {
            run = decodebits(buf, &mut state, 5)?;
            is_smaller = run % 3;
            run -= is_smaller;
            is_smaller -= 1;
        }

        // Positions beyond the buffer are dropped rather than written out of bounds.
        let mut put = |write_idx: &mut usize, value: [i32; 3]| {
            let start = *write_idx * 3;
            if let Some(position) = positions.get_mut(start..start + 3) {
                for (p, v) in position.iter_mut().zip(value) {
                    *p = v as f32 * invprecision;
                }
                *write_idx += 1;
            }
        };

        if run > 0 {
            coord.fill(0);
            for k in (0..run).step_by(3) {
                decodeints(buf, &mut state, smallidx as u32, sizesmall, &mut coord)?;
                read_idx += 1;
                for (c, prev) in coord.iter_mut().zip(prevcoord) {
                    *c = c.wrapping_add(prev.wrapping_sub(smallnum));
                }
                if k == 0 {
                    // Swap the first and second atom. The encoder swaps them to compress water
                    // better, since waters are stored as OHH.
                    std::mem::swap(&mut coord, &mut prevcoord);
                    put(&mut write_idx, prevcoord);
                } else {
                    prevcoord = coord;
                }
                put(&mut write_idx, coord);
            }
        } else {
            put(&mut write_idx, coord);
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
                smallnum = *MAGICINTS
                    .get(smallidx)
                    .ok_or_else(|| invalid("small index ran past the end of the table"))?
                    / 2;
            }
            std::cmp::Ordering::Equal => {}
        }

        if MAGICINTS[smallidx] == 0 {
            return Err(invalid("found an invalid size"));
        }
        sizesmall.fill(MAGICINTS[smallidx] as u32);
        read_idx += 1;
    }

    Ok(())
}

#[inline]
pub(crate) fn read_boxvec<R: Read>(file: &mut R) -> io::Result<BoxVec> {
    let mut boxvec = [0.0; 9];
    read_f32s(file, &mut boxvec)?;
    let cols = [
        [boxvec[0], boxvec[1], boxvec[2]],
        [boxvec[3], boxvec[4], boxvec[5]],
        [boxvec[6], boxvec[7], boxvec[8]],
    ];
    Ok(BoxVec::from_cols_array_2d(&cols))
}

/// Returns the number of padding bytes that follow `count` bytes of opaque xdr data.
pub const fn padding(count: usize) -> usize {
    (4 - (count % 4)) % 4
}

/// Resize `positions` to hold `natoms` atoms, failing instead of aborting if that is impossible.
pub(crate) fn resize_positions(positions: &mut Vec<f32>, natoms: usize) -> io::Result<()> {
    let len = natoms
        .checked_mul(3)
        .ok_or_else(|| invalid(format!("cannot hold {natoms} atoms")))?;
    if let Some(additional) = len.checked_sub(positions.len()) {
        positions
            .try_reserve_exact(additional)
            .map_err(|err| invalid(format!("cannot hold {natoms} atoms: {err}")))?;
    }
    positions.resize(len, 0.0);
    Ok(())
}

/// Read opaque xdr data into `data`, leaving out the padding.
///
/// The buffer grows with the bytes that actually arrive, so a corrupt count cannot make it
/// allocate more than the stream holds.
fn read_opaque<R: Read>(file: &mut R, data: &mut Vec<u8>) -> io::Result<()> {
    let count = read_u32(file)?;
    data.clear();
    let read = file.by_ref().take(count as u64).read_to_end(data)?;
    if read < count as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("compressed data ended after {read} of {count} bytes"),
        ));
    }
    let mut pad = [0u8; 3];
    file.read_exact(&mut pad[..padding(read)])
}

pub(crate) fn read_f32s<R: Read>(file: &mut R, buf: &mut [f32]) -> io::Result<()> {
    for value in buf {
        *value = read_f32(file)?
    }
    Ok(())
}

fn read_i32s<R: Read, const N: usize>(file: &mut R) -> io::Result<[i32; N]> {
    let mut values = [0; N];
    for value in &mut values {
        *value = read_i32(file)?;
    }
    Ok(values)
}

pub(crate) fn read_f32<R: Read>(file: &mut R) -> io::Result<f32> {
    let mut buf: [u8; 4] = Default::default();
    file.read_exact(&mut buf)?;
    Ok(f32::from_be_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(file: &mut R) -> io::Result<i32> {
    let mut buf: [u8; 4] = Default::default();
    file.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_u32<R: Read>(file: &mut R) -> io::Result<u32> {
    let mut buf: [u8; 4] = Default::default();
    file.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read the first `i32` of a frame, or report a clean end of the stream.
///
/// Returns `Ok(None)` if the stream ends before the first byte. A stream that ends within the
/// value is an [`io::ErrorKind::UnexpectedEof`] error, since that is a truncated frame.
pub(crate) fn read_i32_or_eof<R: Read>(file: &mut R) -> io::Result<Option<i32>> {
    let mut buf: [u8; 4] = Default::default();
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended within a frame header",
                ))
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(Some(i32::from_be_bytes(buf)))
}

pub(crate) fn calc_sizeint(
    minint: [i32; 3],
    maxint: [i32; 3],
    sizeint: &mut [u32; 3],
    bitsizeint: &mut [u32; 3],
) -> u32 {
    for i in 0..3 {
        sizeint[i] = (maxint[i].wrapping_sub(minint[i]) as u32).wrapping_add(1);
    }

    bitsizeint.fill(0);

    // Check if one of the sizes is too big to be multiplied.
    if (sizeint[0] | sizeint[1] | sizeint[2]) > 0xffffff {
        bitsizeint[0] = sizeofint(sizeint[0]);
        bitsizeint[1] = sizeofint(sizeint[1]);
        bitsizeint[2] = sizeofint(sizeint[2]);
        return 0; // A bitsize of zero flags the use of large sizes.
    }

    sizeofints(*sizeint)
}

/// The number of bits needed to store values up to and including `size`.
#[inline]
pub(crate) const fn sizeofint(size: u32) -> u32 {
    let mut n: u64 = 1;
    let mut nbits = 0;

    while size as u64 >= n && nbits < 32 {
        nbits += 1;
        n <<= 1;
    }

    nbits
}

/// The number of bits needed to store the product of `sizes`.
pub(crate) fn sizeofints(sizes: [u32; 3]) -> u32 {
    let mut nbytes = 1;
    let mut bytes = [0u8; 32];
    bytes[0] = 1;
    let mut nbits = 0;

    for size in sizes {
        let mut tmp: u64 = 0;
        let mut bytecount = 0;
        while bytecount < nbytes {
            tmp += bytes[bytecount] as u64 * size as u64;
            bytes[bytecount] = (tmp & 0xff) as u8;
            tmp >>= 8;
            bytecount += 1;
        }
        while tmp != 0 {
            bytes[bytecount] = (tmp & 0xff) as u8;
            bytecount += 1;
            tmp >>= 8;
        }
        nbytes = bytecount;
    }

    nbytes -= 1;
    let mut num = 1;
    while bytes[nbytes] as u32 >= num {
        nbits += 1;
        num *= 2;
    }

    nbytes as u32 * 8 + nbits
}

#[inline]
fn next_byte(buf: &[u8], count: &mut usize) -> io::Result<u32> {
    let byte = *buf
        .get(*count)
        .ok_or_else(|| invalid("compressed data ended early"))?;
    *count += 1;
    Ok(byte as u32)
}

fn decodebits<T: TryFrom<u32>>(
    buf: &[u8],
    state: &mut DecodeState,
    mut nbits: usize,
) -> io::Result<T> {
    // A string of ones that is nbits long.
    let mask = if nbits >= 32 {
        u32::MAX
    } else {
        (1u32 << nbits) - 1
    };

    let DecodeState {
        mut count,
        mut lastbits,
        lastbyte,
    } = *state;
    let mut lastbyte = lastbyte as u32;

    let mut num: u32 = 0;
    while nbits >= 8 {
        lastbyte = (lastbyte << 8) | next_byte(buf, &mut count)?;
        num |= (lastbyte >> lastbits) << (nbits - 8);
        nbits -= 8;
    }

    if nbits > 0 {
        if lastbits < nbits {
            lastbits += 8;
            lastbyte = (lastbyte << 8) | next_byte(buf, &mut count)?;
        }
        lastbits -= nbits;
        num |= (lastbyte >> lastbits) & mask;
    }

    num &= mask;
    *state = DecodeState {
        count,
        lastbits,
        lastbyte: (lastbyte & 0xff) as u8, // We don't care about anything but the last byte.
    };

    num.try_into()
        .map_err(|_| invalid(format!("decoded value {num} does not fit the target type")))
}

fn decodeints(
    buf: &[u8],
    state: &mut DecodeState,
    nbits: u32,
    sizes: [u32; 3],
    nums: &mut [i32; 3],
) -> io::Result<()> {
    if nbits <= 32 {
        let v: u32 = unpack_bytes(buf, state, nbits)?;
        *nums = split_packed(v, sizes);
    } else if nbits <= 64 {
        let v: u64 = unpack_bytes(buf, state, nbits)?;
        *nums = split_packed(v, sizes);
    } else {
        let v: u128 = unpack_bytes(buf, state, nbits)?;
        *nums = split_packed(v, sizes);
    }
    Ok(())
}

/// Read `nbits` worth of little-endian bytes into a single integer.
fn unpack_bytes<T>(buf: &[u8], state: &mut DecodeState, mut nbits: u32) -> io::Result<T>
where
    T: From<u32> + std::ops::Shl<u32, Output = T> + std::ops::BitOrAssign,
{
    let mut v = T::from(0);
    let mut nbytes: u32 = 0;
    while nbits >= 8 {
        let byte: u32 = decodebits(buf, state, 8)?;
        v |= T::from(byte) << (8 * nbytes);
        nbytes += 1;
        nbits -= 8;
    }
    if nbits > 0 {
        let byte: u32 = decodebits(buf, state, nbits as usize)?;
        v |= T::from(byte) << (8 * nbytes);
    }
    Ok(v)
}

/// Split a packed value `(x * sy + y) * sz + z` back into its components.
fn split_packed<T>(v: T, sizes: [u32; 3]) -> [i32; 3]
where
    T: From<u32>
        + Copy
        + std::ops::Mul<Output = T>
        + std::ops::Div<Output = T>
        + std::ops::Sub<Output = T>
        + TryInto<u32>,
{
    let sz = T::from(sizes[2]);
    let sy = T::from(sizes[1]);
    let szy = sz * sy;
    let x1 = v / szy;
    let q1 = v - x1 * szy;
    let y1 = q1 / sz;
    let z1 = q1 - y1 * sz;

    [x1, y1, z1].map(|v| v.try_into().unwrap_or(u32::MAX) as i32)
}
