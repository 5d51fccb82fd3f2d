//! Variable-width LZW as used by GIF image data
//!
//! Codes are packed LSB first. The clear code is `1 << min_code_size`, the
//! end-of-information code follows it, and the code width grows by one bit
//! each time the dictionary fills the current width, up to 12 bits.
use weezl::decode::Decoder as LzwDecoder;
use weezl::encode::Encoder as LzwEncoder;
use weezl::{BitOrder, LzwStatus};

use crate::error::{Error, Result};
use crate::types::flag_size;

/// Largest minimum code size a stream may declare.
pub const MAX_MIN_CODE_SIZE: u8 = 11;

/// Indices decoded per step.
const CHUNK_LEN: usize = 1 << 16;

/// Minimum code size for a color table with `table_len` entries.
pub fn min_code_size(table_len: usize) -> u8 {
    (flag_size(table_len) + 1).max(2)
}

/// Decompresses `data`, the concatenated payload of an image's sub-blocks,
/// into at most `expected` indices.
///
/// Decoding stops at the end-of-information code, when the input runs out,
/// or once `expected` indices were produced. `offset` is the stream position
/// of the image data and is used for error reporting.
pub fn decompress(data: &[u8], min_code_size: u8, expected: usize, offset: usize) -> Result<Vec<u8>> {
    if min_code_size > MAX_MIN_CODE_SIZE {
        return Err(Error::CorruptStream {
            offset,
            reason: "invalid minimum LZW code size",
        });
    }
    let mut out = Vec::new();
    if expected == 0 {
        return Ok(out);
    }
    // Output grows only by what was decoded, never by the declared size.
    let mut chunk = vec![0; expected.min(CHUNK_LEN)];
    let mut decoder = LzwDecoder::new(BitOrder::Lsb, min_code_size);
    let mut input = data;
    while out.len() < expected {
        let want = (expected - out.len()).min(chunk.len());
        let res = decoder.decode_bytes(input, &mut chunk[..want]);
        input = &input[res.consumed_in..];
        out.extend_from_slice(&chunk[..res.consumed_out]);
        match res.status {
            Ok(LzwStatus::Ok) => {
                if res.consumed_in == 0 && res.consumed_out == 0 {
                    break;
                }
            }
            Ok(LzwStatus::Done) | Ok(LzwStatus::NoProgress) => break,
            Err(_) => return Err(Error::InvalidLzwCode { offset }),
        }
    }
    Ok(out)
}

/// Compresses palette indices. Every index must be below `1 << min_code_size`.
pub fn compress(indices: &[u8], min_code_size: u8) -> Result<Vec<u8>> {
    if !(2..=8).contains(&min_code_size) {
        return Err(Error::constraint(format!(
            "LZW minimum code size {} is outside 2..=8",
            min_code_size
        )));
    }
    let limit = 1u16 << min_code_size;
    if let Some(&idx) = indices.iter().find(|&&i| i as u16 >= limit) {
        return Err(Error::constraint(format!(
            "index {} does not fit code size {}",
            idx, min_code_size
        )));
    }
    let mut out = Vec::with_capacity(indices.len() / 2 + 4);
    let mut encoder = LzwEncoder::new(BitOrder::Lsb, min_code_size);
    let res = encoder.into_vec(&mut out).encode_all(indices);
    if res.status.is_err() {
        return Err(Error::constraint("LZW encoder rejected the index stream"));
    }
    Ok(out)
}
