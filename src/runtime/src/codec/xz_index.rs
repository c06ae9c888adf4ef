//! Exact uncompressed size of an `.xz` file from its stream indexes.
//!
//! Each xz stream ends with an index listing every block's unpadded and
//! uncompressed size, followed by a 12-byte footer whose backward-size field
//! locates that index. Walking streams from the end of the file (skipping
//! stream padding) yields the total without decoding any block.
//!
//! ```text
//! ┌────────┬────────┬─────┬────────┬───────┬────────┐
//! │ header │ block… │  …  │ index  │ footer│ padding│  (repeated per stream)
//! │  12 B  │        │     │ 4·n B  │  12 B │  4·k B │
//! └────────┴────────┴─────┴────────┴───────┴────────┘
//! ```

use std::io::{self, Read, Seek, SeekFrom};

const HEADER_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];
const FOOTER_MAGIC: [u8; 2] = [b'Y', b'Z'];
const HEADER_SIZE: u64 = 12;
const FOOTER_SIZE: u64 = 12;
const INDEX_INDICATOR: u8 = 0x00;

/// Sum the uncompressed sizes recorded in every stream of an xz file.
pub fn uncompressed_size<R: Read + Seek>(reader: &mut R) -> io::Result<u64> {
    let mut pos = reader.seek(SeekFrom::End(0))?;
    if pos == 0 {
        return Err(invalid("file is empty"));
    }

    let mut total: u64 = 0;
    let mut streams = 0usize;

    while pos > 0 {
        pos = skip_stream_padding(reader, pos)?;
        if pos == 0 {
            break;
        }
        if pos < HEADER_SIZE + FOOTER_SIZE {
            return Err(invalid("truncated stream"));
        }

        let mut footer = [0u8; FOOTER_SIZE as usize];
        read_at(reader, pos - FOOTER_SIZE, &mut footer)?;
        if footer[10..12] != FOOTER_MAGIC {
            return Err(invalid("missing stream footer magic"));
        }

        // Backward size is stored as `(real / 4) - 1`.
        let backward = u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]);
        let index_size = (u64::from(backward) + 1) * 4;
        if index_size > pos - HEADER_SIZE - FOOTER_SIZE {
            return Err(invalid("index size exceeds stream bounds"));
        }

        let mut index = vec![0u8; index_size as usize];
        read_at(reader, pos - FOOTER_SIZE - index_size, &mut index)?;
        let summary = parse_index(&index)?;

        let stream_size = HEADER_SIZE
            .checked_add(summary.blocks_size)
            .and_then(|n| n.checked_add(index_size))
            .and_then(|n| n.checked_add(FOOTER_SIZE))
            .ok_or_else(|| invalid("stream size overflow"))?;
        if stream_size > pos {
            return Err(invalid("blocks extend past start of file"));
        }

        let start = pos - stream_size;
        let mut header = [0u8; HEADER_MAGIC.len()];
        read_at(reader, start, &mut header)?;
        if header != HEADER_MAGIC {
            return Err(invalid("missing stream header magic"));
        }

        total = total
            .checked_add(summary.uncompressed_size)
            .ok_or_else(|| invalid("uncompressed size overflow"))?;
        streams += 1;
        pos = start;
    }

    if streams == 0 {
        return Err(invalid("no xz stream found"));
    }

    Ok(total)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct IndexSummary {
    /// Sum of block sizes rounded up to 4-byte alignment
    blocks_size: u64,
    uncompressed_size: u64,
}

fn parse_index(index: &[u8]) -> io::Result<IndexSummary> {
    if index.first() != Some(&INDEX_INDICATOR) {
        return Err(invalid("missing index indicator"));
    }

    // Trailing CRC32 is not part of the record area.
    let records_end = index
        .len()
        .checked_sub(4)
        .ok_or_else(|| invalid("index too small"))?;
    let mut cursor = 1usize;
    let count = read_varint(index, &mut cursor, records_end)?;

    let mut summary = IndexSummary::default();
    for _ in 0..count {
        let unpadded = read_varint(index, &mut cursor, records_end)?;
        let uncompressed = read_varint(index, &mut cursor, records_end)?;
        if unpadded == 0 {
            return Err(invalid("zero unpadded block size"));
        }

        let padded = unpadded
            .checked_add(3)
            .map(|n| n & !3)
            .ok_or_else(|| invalid("block size overflow"))?;
        summary.blocks_size = summary
            .blocks_size
            .checked_add(padded)
            .ok_or_else(|| invalid("block size overflow"))?;
        summary.uncompressed_size = summary
            .uncompressed_size
            .checked_add(uncompressed)
            .ok_or_else(|| invalid("uncompressed size overflow"))?;
    }

    if index[cursor..records_end].iter().any(|&b| b != 0) {
        return Err(invalid("non-zero index padding"));
    }

    Ok(summary)
}

/// xz multibyte integer: 7 bits per byte, little-endian, at most 9 bytes.
fn read_varint(buf: &[u8], cursor: &mut usize, end: usize) -> io::Result<u64> {
    let mut value: u64 = 0;
    for i in 0..9 {
        if *cursor >= end {
            return Err(invalid("truncated index record"));
        }
        let byte = buf[*cursor];
        *cursor += 1;
        value |= u64::from(byte & 0x7F) << (i * 7);
        if byte & 0x80 == 0 {
            if i > 0 && byte == 0 {
                return Err(invalid("non-minimal integer encoding"));
            }
            return Ok(value);
        }
    }
    Err(invalid("integer encoding too long"))
}

/// Move `pos` back over 4-byte groups of zero padding.
fn skip_stream_padding<R: Read + Seek>(reader: &mut R, mut pos: u64) -> io::Result<u64> {
    let mut word = [0u8; 4];
    while pos >= 4 {
        read_at(reader, pos - 4, &mut word)?;
        if word != [0u8; 4] {
            break;
        }
        pos -= 4;
    }
    Ok(pos)
}

fn read_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf)
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use xz2::write::XzEncoder;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_single_stream_size() {
        let data = sample(200_000);
        let mut cursor = Cursor::new(compress(&data));
        assert_eq!(uncompressed_size(&mut cursor).unwrap(), 200_000);
    }

    #[test]
    fn test_empty_payload_stream() {
        let mut cursor = Cursor::new(compress(b""));
        assert_eq!(uncompressed_size(&mut cursor).unwrap(), 0);
    }

    #[test]
    fn test_concatenated_streams_with_padding() {
        let mut file = compress(&sample(1000));
        file.extend_from_slice(&[0u8; 8]);
        file.extend(compress(&sample(2345)));
        file.extend_from_slice(&[0u8; 4]);

        let mut cursor = Cursor::new(file);
        assert_eq!(uncompressed_size(&mut cursor).unwrap(), 3345);
    }

    #[test]
    fn test_rejects_non_xz_data() {
        let mut cursor = Cursor::new(b"definitely not an xz stream, just text".to_vec());
        let err = uncompressed_size(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_rejects_empty_and_all_padding() {
        assert!(uncompressed_size(&mut Cursor::new(Vec::new())).is_err());
        assert!(uncompressed_size(&mut Cursor::new(vec![0u8; 64])).is_err());
    }

    #[test]
    fn test_rejects_truncated_file() {
        let file = compress(&sample(4096));
        let mut cursor = Cursor::new(file[4..].to_vec());
        assert!(uncompressed_size(&mut cursor).is_err());
    }

    #[test]
    fn test_read_varint_multibyte() {
        // 300 = 0b1_0010_1100 -> [0xAC, 0x02]
        let buf = [0xAC, 0x02];
        let mut cursor = 0;
        assert_eq!(read_varint(&buf, &mut cursor, buf.len()).unwrap(), 300);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_read_varint_rejects_non_minimal() {
        let buf = [0x80, 0x00];
        let mut cursor = 0;
        assert!(read_varint(&buf, &mut cursor, buf.len()).is_err());
    }
}
