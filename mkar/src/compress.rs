//! Zstandard compression, gated behind the `compression` cargo feature.

use crate::Error;

pub const LEVEL: i32 = 11;

#[cfg(feature = "compression")]
pub fn compress(data: &[u8]) -> Result<Vec<u8>, Error> {
    zstd::stream::encode_all(data, LEVEL).map_err(Error::Io)
}

/// Decompresses a single zstd frame. The frame's own content-size field
/// determines the output buffer size; a frame that omits it (streamed
/// without a known length) is rejected rather than decompressed into an
/// unbounded buffer.
#[cfg(feature = "compression")]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let frame_size = zstd::zstd_safe::get_frame_content_size(data)
        .map_err(|e| Error::Decompression(e.to_string()))?
        .ok_or(Error::UnknownFrameSize)?;

    let mut decoder = zstd::bulk::Decompressor::new().map_err(Error::Io)?;
    let out = decoder
        .decompress(data, frame_size as usize)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    if out.len() as u64 != frame_size {
        return Err(Error::Decompression(format!(
            "decompressed {} bytes, frame declared {frame_size}",
            out.len()
        )));
    }
    Ok(out)
}

#[cfg(not(feature = "compression"))]
pub fn compress(_data: &[u8]) -> Result<Vec<u8>, Error> {
    Err(Error::FeatureDisabled("compression"))
}

#[cfg(not(feature = "compression"))]
pub fn decompress(_data: &[u8]) -> Result<Vec<u8>, Error> {
    Err(Error::FeatureDisabled("compression"))
}

#[cfg(all(test, feature = "compression"))]
mod test {
    use super::*;

    #[test]
    fn compress_decompress_round_trip() {
        let data = b"some text that repeats, repeats, repeats to compress well".to_vec();
        let compressed = compress(&data).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn empty_input_round_trips() {
        let compressed = compress(&[]).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert!(decompressed.is_empty());
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(decompress(b"not a zstd frame").is_err());
    }
}
