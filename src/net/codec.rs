//! Binary payload codec
//!
//! All multi-byte values are little-endian. Strings carry a presence flag:
//! an absent string decodes to the literal `"null"`, never to `""`.

use std::io;

use crate::util::vec::{Vector2i, Vector3};

/// Decoded value of a string whose presence flag was false
pub const NULL_STRING: &str = "null";

/// Errors raised while decoding a single payload
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Truncated stream: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("Invalid length prefix: {0}")]
    InvalidLength(i32),
    #[error("Invalid world size: {0}")]
    InvalidWorldSize(i32),
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("Decompression failed: {0}")]
    Decompress(#[from] io::Error),
}

impl DecodeError {
    /// End of data was hit mid-field
    pub fn is_truncated(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }
}

/// Sequential reader over one packet payload. The cursor only moves forward.
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read exactly n bytes
    pub fn read(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining,
            });
        }
        let slice = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// i32 length prefix that must not be negative
    fn read_len(&mut self) -> Result<usize, DecodeError> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| DecodeError::InvalidLength(len))
    }

    /// Length-prefixed raw bytes
    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_len()?;
        self.read(len)
    }

    /// Presence flag, then length-prefixed UTF-8. Invalid sequences are replaced.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        if !self.read_bool()? {
            return Ok(NULL_STRING.to_string());
        }
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_vector3(&mut self) -> Result<Vector3, DecodeError> {
        Ok(Vector3::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    pub fn read_vector2i(&mut self) -> Result<Vector2i, DecodeError> {
        Ok(Vector2i::new(self.read_i32()?, self.read_i32()?))
    }

    /// Read an i32 count, then call `item` that many times in wire order.
    /// Items may read nested lists.
    pub fn read_list<F>(&mut self, mut item: F) -> Result<(), DecodeError>
    where
        F: FnMut(&mut Self) -> Result<(), DecodeError>,
    {
        let count = self.read_len()?;
        for _ in 0..count {
            item(self)?;
        }
        Ok(())
    }

    /// Collecting variant of [`read_list`](Self::read_list)
    pub fn read_vec<T, F>(&mut self, mut item: F) -> Result<Vec<T>, DecodeError>
    where
        F: FnMut(&mut Self) -> Result<T, DecodeError>,
    {
        let mut out = Vec::new();
        self.read_list(|reader| {
            out.push(item(reader)?);
            Ok(())
        })?;
        Ok(out)
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

/// Payload builder, the encode side of [`PacketReader`]
#[derive(Debug, Clone, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(value as u8)
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Length-prefixed raw bytes
    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.write_len(data.len());
        self.buffer.extend_from_slice(data);
        self
    }

    /// Empty strings are sent as absent, so they read back as `"null"`
    pub fn write_string(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(s) if !s.is_empty() => {
                self.write_bool(true);
                self.write_bytes(s.as_bytes())
            }
            _ => self.write_bool(false),
        }
    }

    pub fn write_vector3(&mut self, value: Vector3) -> &mut Self {
        self.write_f32(value.x).write_f32(value.y).write_f32(value.z)
    }

    pub fn write_vector2i(&mut self, value: Vector2i) -> &mut Self {
        self.write_i32(value.x).write_i32(value.y)
    }

    pub fn write_list<T, F>(&mut self, items: &[T], mut item: F) -> &mut Self
    where
        F: FnMut(&mut Self, &T),
    {
        self.write_len(items.len());
        for value in items {
            item(self, value);
        }
        self
    }

    fn write_len(&mut self, len: usize) {
        // Lengths above i32::MAX are not representable on the wire
        self.write_i32(i32::try_from(len).unwrap_or(i32::MAX));
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_roundtrip() {
        let mut w = PacketWriter::new();
        w.write_bool(true)
            .write_u8(200)
            .write_i16(-1234)
            .write_i32(-56789)
            .write_f32(2.5);
        let data = w.build();
        assert_eq!(data.len(), 1 + 1 + 2 + 4 + 4);

        let mut r = PacketReader::new(&data);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_u8().unwrap(), 200);
        assert_eq!(r.read_i16().unwrap(), -1234);
        assert_eq!(r.read_i32().unwrap(), -56789);
        assert_eq!(r.read_f32().unwrap(), 2.5);
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut w = PacketWriter::new();
        w.write_i32(1).write_i16(2);
        assert_eq!(w.as_slice(), &[1, 0, 0, 0, 2, 0]);
    }

    #[test]
    fn test_reencode_reproduces_bytes() {
        let original: Vec<u8> = vec![
            1, // bool
            0x10, 0x27, 0, 0, // 10000
            0, 0, 0x80, 0x3f, // 1.0f
        ];
        let mut r = PacketReader::new(&original);
        let mut w = PacketWriter::new();
        w.write_bool(r.read_bool().unwrap())
            .write_i32(r.read_i32().unwrap())
            .write_f32(r.read_f32().unwrap());
        assert_eq!(w.build(), original);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut w = PacketWriter::new();
        w.write_string(Some("Pine Forest"))
            .write_string(Some("ünïcødé"));
        let data = w.build();

        let mut r = PacketReader::new(&data);
        assert_eq!(r.read_string().unwrap(), "Pine Forest");
        assert_eq!(r.read_string().unwrap(), "ünïcødé");
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_absent_string_is_null_sentinel() {
        let data = [0u8];
        let mut r = PacketReader::new(&data);
        let s = r.read_string().unwrap();
        assert_eq!(s, "null");
        assert!(!s.is_empty());
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn test_empty_string_written_as_absent() {
        let mut w = PacketWriter::new();
        w.write_string(Some("")).write_string(None);
        assert_eq!(w.as_slice(), &[0, 0]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let data = [1u8, 2, 0, 0, 0, 0xff, b'a'];
        let mut r = PacketReader::new(&data);
        assert_eq!(r.read_string().unwrap(), "\u{fffd}a");
    }

    #[test]
    fn test_read_bytes() {
        let mut w = PacketWriter::new();
        w.write_bytes(&[9, 8, 7]);
        let data = w.build();
        let mut r = PacketReader::new(&data);
        assert_eq!(r.read_bytes().unwrap(), &[9, 8, 7]);
    }

    #[test]
    fn test_vectors() {
        let mut w = PacketWriter::new();
        w.write_vector3(Vector3::new(1.0, -2.0, 3.5))
            .write_vector2i(Vector2i::new(-7, 11));
        let data = w.build();
        assert_eq!(data.len(), 12 + 8);

        let mut r = PacketReader::new(&data);
        assert_eq!(r.read_vector3().unwrap(), Vector3::new(1.0, -2.0, 3.5));
        assert_eq!(r.read_vector2i().unwrap(), Vector2i::new(-7, 11));
    }

    #[test]
    fn test_truncated_field() {
        let data = [1u8, 2, 3];
        let mut r = PacketReader::new(&data);
        let err = r.read_i32().unwrap_err();
        assert!(err.is_truncated());
        assert!(matches!(
            err,
            DecodeError::Truncated {
                needed: 4,
                remaining: 3
            }
        ));
        // failed read does not advance
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_truncated_string_body() {
        let data = [1u8, 10, 0, 0, 0, b'a', b'b'];
        let mut r = PacketReader::new(&data);
        assert!(r.read_string().unwrap_err().is_truncated());
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut w = PacketWriter::new();
        w.write_i32(-1);
        let data = w.build();
        let mut r = PacketReader::new(&data);
        assert!(matches!(
            r.read_bytes(),
            Err(DecodeError::InvalidLength(-1))
        ));
    }

    #[test]
    fn test_read_list_calls_in_order_and_consumes_exactly() {
        let items = [10i32, 20, 30, 40];
        let mut w = PacketWriter::new();
        w.write_list(&items, |w, v| {
            w.write_i32(*v);
        });
        w.write_u8(0xAA); // trailing sentinel
        let data = w.build();

        let mut r = PacketReader::new(&data);
        let mut seen = Vec::new();
        r.read_list(|r| {
            seen.push(r.read_i32()?);
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, items);
        assert_eq!(r.position(), 4 + 4 * items.len());
        assert_eq!(r.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn test_nested_lists() {
        let groups: Vec<(&str, Vec<f32>)> = vec![("a", vec![1.0, 2.0]), ("b", vec![]), ("c", vec![3.0])];
        let mut w = PacketWriter::new();
        w.write_list(&groups, |w, (name, values)| {
            w.write_string(Some(*name));
            w.write_list(values, |w, v| {
                w.write_f32(*v);
            });
        });
        let data = w.build();

        let mut r = PacketReader::new(&data);
        let mut flat = Vec::new();
        r.read_list(|r| {
            let name = r.read_string()?;
            r.read_list(|r| {
                flat.push((name.clone(), r.read_f32()?));
                Ok(())
            })
        })
        .unwrap();

        assert_eq!(
            flat,
            vec![
                ("a".to_string(), 1.0),
                ("a".to_string(), 2.0),
                ("c".to_string(), 3.0)
            ]
        );
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_read_vec_empty() {
        let data = 0i32.to_le_bytes();
        let mut r = PacketReader::new(&data);
        let v: Vec<i32> = r.read_vec(|r| r.read_i32()).unwrap();
        assert!(v.is_empty());
    }

    #[test]
    fn test_list_count_exceeds_data() {
        let mut w = PacketWriter::new();
        w.write_i32(3).write_i32(1);
        let data = w.build();
        let mut r = PacketReader::new(&data);
        let result: Result<Vec<i32>, _> = r.read_vec(|r| r.read_i32());
        assert!(result.unwrap_err().is_truncated());
    }
}
