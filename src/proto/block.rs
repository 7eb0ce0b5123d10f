//! IEEE 488.2 arbitrary block data.
//!
//! A definite-length block is `#`, one digit `d`, `d` digits giving the
//! payload length in bytes, then the payload. `#0` starts an indefinite
//! block which runs until the message terminator.

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use bytes::{BufMut, BytesMut};
use std::io;

/// Byte order of binary sample blocks, named after `FORMat:BORDer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Most significant byte first, the instrument default.
    #[default]
    Normal,
    /// Least significant byte first.
    Swapped,
}

impl Endianness {
    pub fn scpi(&self) -> &'static str {
        match self {
            Self::Normal => "NORM",
            Self::Swapped => "SWAP",
        }
    }
}

/// Location of a block inside a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockHeader {
    /// `header` bytes of framing followed by `len` bytes of payload.
    Definite { header: usize, len: usize },
    /// `#0`, payload ends at the message terminator.
    Indefinite,
}

/// Parse the block header at the start of `src`.
///
/// Returns `Ok(None)` if more bytes are needed to read the header.
pub fn parse_header(src: &[u8]) -> io::Result<Option<BlockHeader>> {
    if src.is_empty() {
        return Ok(None);
    }
    if src[0] != b'#' {
        return Err(invalid("Block data must start with '#'"));
    }
    let Some(&digit) = src.get(1) else {
        return Ok(None);
    };
    let digits = match digit {
        b'0' => return Ok(Some(BlockHeader::Indefinite)),
        b'1'..=b'9' => (digit - b'0') as usize,
        other => {
            return Err(invalid(format!(
                "Invalid block length digit: {:?}",
                other as char
            )))
        }
    };
    if src.len() < 2 + digits {
        return Ok(None);
    }
    let len = std::str::from_utf8(&src[2..2 + digits])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| invalid("Invalid block length"))?;
    Ok(Some(BlockHeader::Definite {
        header: 2 + digits,
        len,
    }))
}

/// Definite-length header for a payload of `len` bytes.
///
/// The length must fit in nine decimal digits.
pub fn header(len: usize) -> io::Result<String> {
    let digits = len.to_string();
    if digits.len() > 9 {
        return Err(invalid(format!(
            "Block length {} exceeds nine digits",
            len
        )));
    }
    Ok(format!("#{}{}", digits.len(), digits))
}

/// Append a definite-length header for a payload of `len` bytes.
pub fn put_header(dst: &mut BytesMut, len: usize) -> io::Result<()> {
    dst.put_slice(header(len)?.as_bytes());
    Ok(())
}

/// Append `data` as a definite-length block.
pub fn put_block(dst: &mut BytesMut, data: &[u8]) -> io::Result<()> {
    put_header(dst, data.len())?;
    dst.put_slice(data);
    Ok(())
}

/// Append samples as a block of IEEE-754 single precision floats.
pub fn put_f32_block(dst: &mut BytesMut, samples: &[f64], order: Endianness) -> io::Result<()> {
    put_header(dst, samples.len() * 4)?;
    dst.reserve(samples.len() * 4);
    let mut writer = dst.writer();
    for sample in samples {
        match order {
            Endianness::Normal => writer.write_f32::<BigEndian>(*sample as f32)?,
            Endianness::Swapped => writer.write_f32::<LittleEndian>(*sample as f32)?,
        }
    }
    Ok(())
}

/// Decode a payload of IEEE-754 single precision floats.
pub fn decode_f32(payload: &[u8], order: Endianness) -> io::Result<Vec<f32>> {
    if payload.len() % 4 != 0 {
        return Err(invalid(format!(
            "Block length {} is not a multiple of 4",
            payload.len()
        )));
    }
    let mut out = vec![0.0; payload.len() / 4];
    match order {
        Endianness::Normal => BigEndian::read_f32_into(payload, &mut out),
        Endianness::Swapped => LittleEndian::read_f32_into(payload, &mut out),
    }
    Ok(out)
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut buf = BytesMut::new();
        put_block(&mut buf, b"hello world!").unwrap();
        assert_eq!(&buf[..], b"#212hello world!");

        let mut buf = BytesMut::new();
        put_block(&mut buf, b"").unwrap();
        assert_eq!(&buf[..], b"#10");
    }

    #[test]
    fn test_header_length_limit() {
        assert_eq!(header(999_999_999).unwrap(), "#9999999999");
        assert!(header(1_000_000_000).is_err());

        let mut buf = BytesMut::from(&b"DATA:ARB func,"[..]);
        assert!(put_header(&mut buf, 1_000_000_000).is_err());
        assert_eq!(&buf[..], b"DATA:ARB func,");
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header(b"").unwrap(), None);
        assert_eq!(parse_header(b"#").unwrap(), None);
        assert_eq!(parse_header(b"#3").unwrap(), None);
        assert_eq!(parse_header(b"#31").unwrap(), None);
        assert_eq!(
            parse_header(b"#3128abc").unwrap(),
            Some(BlockHeader::Definite { header: 5, len: 128 })
        );
        assert_eq!(parse_header(b"#0abc").unwrap(), Some(BlockHeader::Indefinite));
        assert!(parse_header(b"12").is_err());
        assert!(parse_header(b"#x1").is_err());
        assert!(parse_header(b"#2ab").is_err());
    }

    #[test]
    fn test_f32_block_byte_order() {
        let mut buf = BytesMut::new();
        put_f32_block(&mut buf, &[1.0], Endianness::Normal).unwrap();
        assert_eq!(&buf[..], &[b'#', b'1', b'4', 0x3f, 0x80, 0x00, 0x00]);

        let mut buf = BytesMut::new();
        put_f32_block(&mut buf, &[1.0], Endianness::Swapped).unwrap();
        assert_eq!(&buf[..], &[b'#', b'1', b'4', 0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_decode_f32() {
        let samples = [0.0, 0.5, -0.5, 1.0, 0.1];
        for order in [Endianness::Normal, Endianness::Swapped] {
            let mut buf = BytesMut::new();
            put_f32_block(&mut buf, &samples, order).unwrap();
            assert_eq!(&buf[..4], b"#220");
            let decoded = decode_f32(&buf[4..], order).unwrap();
            assert_eq!(decoded.len(), samples.len());
            for (a, b) in decoded.iter().zip(samples) {
                assert!((*a as f64 - b).abs() < 1e-7);
            }
        }
        assert!(decode_f32(&[0, 0, 0], Endianness::Normal).is_err());
    }
}
