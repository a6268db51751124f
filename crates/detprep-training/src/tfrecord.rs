//! TFRecord framing.
//!
//! Each record is laid out as:
//! `u64 length (LE) | u32 masked crc32c(length) | data | u32 masked crc32c(data)`

use std::io::{self, Read, Write};

/// Reflected CRC-32C (Castagnoli) polynomial.
const CRC32C_POLY: u32 = 0x82F6_3B78;
const MASK_DELTA: u32 = 0xa282_ead8;

const CRC32C_TABLE: [u32; 256] = build_crc32c_table();

const fn build_crc32c_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ CRC32C_POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

pub fn crc32c(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        crc = CRC32C_TABLE[((crc ^ u32::from(byte)) & 0xff) as usize] ^ (crc >> 8);
    }
    !crc
}

pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Appends framed records to an underlying writer.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
    records: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, records: 0 }
    }

    pub fn write_record(&mut self, data: &[u8]) -> io::Result<()> {
        let len = (data.len() as u64).to_le_bytes();
        self.inner.write_all(&len)?;
        self.inner.write_all(&masked_crc32c(&len).to_le_bytes())?;
        self.inner.write_all(data)?;
        self.inner.write_all(&masked_crc32c(data).to_le_bytes())?;
        self.records += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Read every record, verifying both checksums.
pub fn read_records<R: Read>(mut reader: R) -> io::Result<Vec<Vec<u8>>> {
    let mut records = Vec::new();
    loop {
        let mut len_bytes = [0u8; 8];
        let filled = read_full(&mut reader, &mut len_bytes)?;
        if filled == 0 {
            break;
        }
        if filled < len_bytes.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated record header"));
        }
        let mut crc_bytes = [0u8; 4];
        reader.read_exact(&mut crc_bytes)?;
        if u32::from_le_bytes(crc_bytes) != masked_crc32c(&len_bytes) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "corrupted record length"));
        }

        let len = usize::try_from(u64::from_le_bytes(len_bytes))
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record too large"))?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        reader.read_exact(&mut crc_bytes)?;
        if u32::from_le_bytes(crc_bytes) != masked_crc32c(&data) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "corrupted record data"));
        }
        records.push(data);
    }
    Ok(records)
}

/// Fill `buf` as far as the stream allows; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32c_check_values() {
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c(&[0u8; 32]), 0x8A91_36AA);
        assert_eq!(crc32c(&[]), 0);
    }

    #[test]
    fn test_record_layout() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(b"abc").unwrap();
        assert_eq!(writer.records_written(), 1);
        let bytes = writer.finish().unwrap();

        assert_eq!(bytes.len(), 8 + 4 + 3 + 4);
        assert_eq!(&bytes[..8], &3u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &masked_crc32c(&3u64.to_le_bytes()).to_le_bytes());
        assert_eq!(&bytes[12..15], b"abc");
        assert_eq!(&bytes[15..], &masked_crc32c(b"abc").to_le_bytes());
    }

    #[test]
    fn test_read_back_and_detect_corruption() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(b"first").unwrap();
        writer.write_record(b"").unwrap();
        writer.write_record(b"third record").unwrap();
        let mut bytes = writer.finish().unwrap();

        let records = read_records(bytes.as_slice()).unwrap();
        assert_eq!(records, vec![b"first".to_vec(), Vec::new(), b"third record".to_vec()]);

        let last = bytes.len() - 6;
        bytes[last] ^= 0xff;
        let err = read_records(bytes.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_stream_is_error() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(b"payload").unwrap();
        let bytes = writer.finish().unwrap();
        assert!(read_records(&bytes[..bytes.len() - 2]).is_err());
        assert!(read_records(&bytes[..4]).is_err());
    }
}
