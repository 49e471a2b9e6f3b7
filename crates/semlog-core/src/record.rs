//! Compact schemaless structured-record format used to serialize a whole
//! [`crate::container::CompressedLog`] to bytes.
//!
//! A record is a flat, ordered sequence of fields. Every field is
//! length-prefixed so the format needs no schema to parse: strings and byte
//! blobs carry a `u32 LE` byte length, integers are fixed-width `u64 LE`,
//! and lists carry a `u32 LE` element count ahead of their elements. This
//! mirrors the little-endian length-prefixed framing the container's BWT
//! block header already uses.

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::Cursor;

use crate::error::ContainerError;

/// Write-side cursor: a plain growable buffer with typed append helpers.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.write_u64::<LE>(v).expect("writing to Vec never fails");
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.write_i64::<LE>(v).expect("writing to Vec never fails");
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.write_u32::<LE>(bytes.len() as u32).expect("writing to Vec never fails");
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    pub fn write_str_list(&mut self, items: &[String]) {
        self.buf.write_u32::<LE>(items.len() as u32).expect("writing to Vec never fails");
        for item in items {
            self.write_str(item);
        }
    }

    pub fn write_bytes_list(&mut self, items: &[Vec<u8>]) {
        self.buf.write_u32::<LE>(items.len() as u32).expect("writing to Vec never fails");
        for item in items {
            self.write_bytes(item);
        }
    }

    pub fn write_u32_list(&mut self, items: &[u32]) {
        self.buf.write_u32::<LE>(items.len() as u32).expect("writing to Vec never fails");
        for &item in items {
            self.buf.write_u32::<LE>(item).expect("writing to Vec never fails");
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Read-side cursor over a byte slice produced by [`RecordWriter`].
pub struct RecordReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> RecordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(bytes) }
    }

    fn truncated(context: &str) -> ContainerError {
        ContainerError::CorruptContainer(format!("truncated record while reading {context}"))
    }

    pub fn read_u64(&mut self, context: &str) -> Result<u64, ContainerError> {
        self.cursor.read_u64::<LE>().map_err(|_| Self::truncated(context))
    }

    pub fn read_i64(&mut self, context: &str) -> Result<i64, ContainerError> {
        self.cursor.read_i64::<LE>().map_err(|_| Self::truncated(context))
    }

    pub fn read_u8(&mut self, context: &str) -> Result<u8, ContainerError> {
        self.cursor.read_u8().map_err(|_| Self::truncated(context))
    }

    pub fn read_bytes(&mut self, context: &str) -> Result<Vec<u8>, ContainerError> {
        let len = self.cursor.read_u32::<LE>().map_err(|_| Self::truncated(context))? as usize;
        let start = self.cursor.position() as usize;
        let end = start
            .checked_add(len)
            .filter(|&e| e <= self.cursor.get_ref().len())
            .ok_or_else(|| Self::truncated(context))?;
        let slice = self.cursor.get_ref()[start..end].to_vec();
        self.cursor.set_position(end as u64);
        Ok(slice)
    }

    pub fn read_str(&mut self, context: &str) -> Result<String, ContainerError> {
        let bytes = self.read_bytes(context)?;
        String::from_utf8(bytes).map_err(|_| {
            ContainerError::CorruptContainer(format!("field {context} is not valid UTF-8"))
        })
    }

    pub fn read_str_list(&mut self, context: &str) -> Result<Vec<String>, ContainerError> {
        let count = self.cursor.read_u32::<LE>().map_err(|_| Self::truncated(context))?;
        (0..count).map(|_| self.read_str(context)).collect()
    }

    pub fn read_bytes_list(&mut self, context: &str) -> Result<Vec<Vec<u8>>, ContainerError> {
        let count = self.cursor.read_u32::<LE>().map_err(|_| Self::truncated(context))?;
        (0..count).map(|_| self.read_bytes(context)).collect()
    }

    pub fn read_u32_list(&mut self, context: &str) -> Result<Vec<u32>, ContainerError> {
        let count = self.cursor.read_u32::<LE>().map_err(|_| Self::truncated(context))?;
        (0..count)
            .map(|_| self.cursor.read_u32::<LE>().map_err(|_| Self::truncated(context)))
            .collect()
    }
}
