//! Little-endian primitives and field values on the wire.
//!
//! Values are written as a one-byte kind tag followed by the payload. Tag `0`
//! is the unset state; strings, byte blobs and entity arrays carry a `u32`
//! length prefix.

use engine_component::{EntityId, FieldValue};
use glam::{Vec2, Vec3, Vec4};

use crate::error::CodecError;

const VALUE_UNSET: u8 = 0;
const VALUE_INT: u8 = 1;
const VALUE_FLOAT: u8 = 2;
const VALUE_BOOL: u8 = 3;
const VALUE_STRING: u8 = 4;
const VALUE_BYTES: u8 = 5;
const VALUE_VEC2: u8 = 6;
const VALUE_VEC3: u8 = 7;
const VALUE_VEC4: u8 = 8;
const VALUE_ENTITY: u8 = 9;
const VALUE_ENTITY_ARRAY: u8 = 10;

/// Appends wire primitives to a byte buffer.
pub struct WireWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn entity(&mut self, id: EntityId) {
        self.i64(id.0);
    }

    /// Length-prefixed byte blob.
    pub fn blob(&mut self, bytes: &[u8]) {
        self.u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn floats(&mut self, values: &[f32]) {
        for &v in values {
            self.f32(v);
        }
    }

    pub fn value(&mut self, value: Option<&FieldValue>) {
        let Some(value) = value else {
            self.u8(VALUE_UNSET);
            return;
        };
        match value {
            FieldValue::Int(v) => {
                self.u8(VALUE_INT);
                self.i32(*v);
            }
            FieldValue::Float(v) => {
                self.u8(VALUE_FLOAT);
                self.f32(*v);
            }
            FieldValue::Bool(v) => {
                self.u8(VALUE_BOOL);
                self.u8(u8::from(*v));
            }
            FieldValue::String(v) => {
                self.u8(VALUE_STRING);
                self.blob(v.as_bytes());
            }
            FieldValue::Bytes(v) => {
                self.u8(VALUE_BYTES);
                self.blob(v);
            }
            FieldValue::Vec2(v) => {
                self.u8(VALUE_VEC2);
                self.floats(&v.to_array());
            }
            FieldValue::Vec3(v) => {
                self.u8(VALUE_VEC3);
                self.floats(&v.to_array());
            }
            FieldValue::Vec4(v) => {
                self.u8(VALUE_VEC4);
                self.floats(&v.to_array());
            }
            FieldValue::Entity(id) => {
                self.u8(VALUE_ENTITY);
                self.entity(*id);
            }
            FieldValue::EntityArray(ids) => {
                self.u8(VALUE_ENTITY_ARRAY);
                self.u32(ids.len() as u32);
                for &id in ids {
                    self.entity(id);
                }
            }
        }
    }
}

/// Reads wire primitives from a byte slice.
pub struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    /// Offset of the next unread byte.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(CodecError::UnexpectedEof {
                needed: n - remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn i32(&mut self) -> Result<i32, CodecError> {
        self.array().map(i32::from_le_bytes)
    }

    pub fn i64(&mut self) -> Result<i64, CodecError> {
        self.array().map(i64::from_le_bytes)
    }

    pub fn f32(&mut self) -> Result<f32, CodecError> {
        self.array().map(f32::from_le_bytes)
    }

    pub fn entity(&mut self) -> Result<EntityId, CodecError> {
        self.i64().map(EntityId)
    }

    pub fn blob(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn floats<const N: usize>(&mut self) -> Result<[f32; N], CodecError> {
        let mut out = [0.0; N];
        for v in &mut out {
            *v = self.f32()?;
        }
        Ok(out)
    }

    pub fn value(&mut self) -> Result<Option<FieldValue>, CodecError> {
        let value = match self.u8()? {
            VALUE_UNSET => return Ok(None),
            VALUE_INT => FieldValue::Int(self.i32()?),
            VALUE_FLOAT => FieldValue::Float(self.f32()?),
            VALUE_BOOL => FieldValue::Bool(self.u8()? != 0),
            VALUE_STRING => {
                let bytes = self.blob()?;
                let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                FieldValue::String(s.to_owned())
            }
            VALUE_BYTES => FieldValue::Bytes(self.blob()?.to_vec()),
            VALUE_VEC2 => FieldValue::Vec2(Vec2::from_array(self.floats()?)),
            VALUE_VEC3 => FieldValue::Vec3(Vec3::from_array(self.floats()?)),
            VALUE_VEC4 => FieldValue::Vec4(Vec4::from_array(self.floats()?)),
            VALUE_ENTITY => FieldValue::Entity(self.entity()?),
            VALUE_ENTITY_ARRAY => {
                let len = self.u32()? as usize;
                // Check the length against the input before allocating.
                let needed = len.saturating_mul(8);
                if self.remaining() < needed {
                    return Err(CodecError::UnexpectedEof {
                        needed: needed - self.remaining(),
                    });
                }
                let mut ids = Vec::with_capacity(len);
                for _ in 0..len {
                    ids.push(self.entity()?);
                }
                FieldValue::EntityArray(ids)
            }
            tag => return Err(CodecError::UnknownValueTag(tag)),
        };
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_little_endian() {
        let mut buf = Vec::new();
        let mut w = WireWriter::new(&mut buf);
        w.u32(1);
        w.i64(-2);
        assert_eq!(&buf[..4], &[1, 0, 0, 0]);
        assert_eq!(&buf[4..], &(-2i64).to_le_bytes());

        let mut r = WireReader::new(&buf, 0);
        assert_eq!(r.u32(), Ok(1));
        assert_eq!(r.i64(), Ok(-2));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_value_layout() {
        let mut buf = Vec::new();
        WireWriter::new(&mut buf).value(Some(&FieldValue::String("hi".into())));
        assert_eq!(buf, vec![VALUE_STRING, 2, 0, 0, 0, b'h', b'i']);

        buf.clear();
        WireWriter::new(&mut buf).value(None);
        assert_eq!(buf, vec![VALUE_UNSET]);
    }

    #[test]
    fn test_values_read_back() {
        let values = [
            FieldValue::Int(-9),
            FieldValue::Float(3.5),
            FieldValue::Bool(true),
            FieldValue::String(String::new()),
            FieldValue::Bytes(vec![0, 255]),
            FieldValue::Vec2(Vec2::new(4.0, -4.0)),
            FieldValue::Vec3(Vec3::new(1.0, -2.0, 0.5)),
            FieldValue::Vec4(Vec4::new(1.0, 2.0, 3.0, 4.0)),
            FieldValue::Entity(EntityId(-7)),
            FieldValue::EntityArray(vec![EntityId(3), EntityId(-1)]),
        ];
        let mut buf = Vec::new();
        let mut w = WireWriter::new(&mut buf);
        for v in &values {
            w.value(Some(v));
        }

        let mut r = WireReader::new(&buf, 0);
        for v in &values {
            assert_eq!(r.value().unwrap().as_ref(), Some(v));
        }
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_truncated_input() {
        let mut r = WireReader::new(&[VALUE_INT, 1, 0], 0);
        assert_eq!(r.value(), Err(CodecError::UnexpectedEof { needed: 2 }));
    }

    #[test]
    fn test_oversized_array_length_rejected() {
        let mut r = WireReader::new(&[VALUE_ENTITY_ARRAY, 255, 255, 255, 255], 0);
        assert!(matches!(r.value(), Err(CodecError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_bad_utf8_and_tag() {
        let mut r = WireReader::new(&[VALUE_STRING, 1, 0, 0, 0, 0xFF], 0);
        assert_eq!(r.value(), Err(CodecError::InvalidUtf8));
        let mut r = WireReader::new(&[42], 0);
        assert_eq!(r.value(), Err(CodecError::UnknownValueTag(42)));
    }
}
