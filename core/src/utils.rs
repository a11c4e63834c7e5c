use std::fmt;
use byteorder::{ByteOrder, LittleEndian};
use num_enum::TryFromPrimitive;

use crate::constants::BYTES_PER_SAMPLE;

pub fn enum_name_or_hex<T>(raw: T::Primitive) -> String
where
    T: TryFromPrimitive + fmt::Debug,
    T::Primitive: fmt::LowerHex,
{
    match T::try_from_primitive(raw) {
        Ok(variant) => format!("{:?}", variant),
        Err(_) => format!("0x{:x}", raw),
    }
}

// Helper function to flatten frames or packets into a single blob
pub fn concat_frames(frames: &[impl AsRef<[u8]>]) -> Vec<u8> {
    frames.iter()
        .flat_map(|f| f.as_ref())
        .copied()
        .collect()
}

/// Reinterpret little-endian PCM bytes as samples.
///
/// Returns `None` when `pcm` is not a whole number of 16-bit samples.
pub fn pcm_to_samples(pcm: &[u8]) -> Option<Vec<i16>> {
    if pcm.len() % BYTES_PER_SAMPLE != 0 {
        return None;
    }
    let mut samples = vec![0i16; pcm.len() / BYTES_PER_SAMPLE];
    LittleEndian::read_i16_into(pcm, &mut samples);
    Some(samples)
}

/// Serialize samples as little-endian PCM bytes.
pub fn samples_to_pcm(samples: &[i16]) -> Vec<u8> {
    let mut out = vec![0u8; samples.len() * BYTES_PER_SAMPLE];
    LittleEndian::write_i16_into(samples, &mut out);
    out
}
