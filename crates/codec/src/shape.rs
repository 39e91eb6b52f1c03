//! Shape descriptors
//!
//! A shape is the canonical, value-independent description of a Rust type
//! as serde sees it. Two values of the same type always produce the same
//! shape, so the shape string is what the encoder registers once per type.
//!
//! | serde data model | shape |
//! |---|---|
//! | `i8`..`i128` | `int` |
//! | `u8`..`u128` | `uint` |
//! | `f32`, `f64` | `float` |
//! | `bool` | `bool` |
//! | `char`, `str` | `string` |
//! | bytes | `bytes` |
//! | `None`, `Some(_)` | `option` |
//! | `()` | `unit` |
//! | sequence | `seq` |
//! | map | `map` |
//! | unit struct | `Name` |
//! | newtype struct | `Name(inner)` |
//! | tuple | `(a,b)` |
//! | tuple struct | `Name(a,b)` |
//! | struct | `Name{field:shape,...}` |
//! | any enum variant | `enum Name` |
//!
//! Options, sequences, maps and enums do not recurse: their contents vary
//! from value to value while the type stays the same.

use std::fmt::Display;

use serde::ser::{self, Serialize};
use thiserror::Error;

/// A value whose `Serialize` impl failed while its shape was being probed
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ShapeError(String);

impl ser::Error for ShapeError {
    fn custom<T: Display>(msg: T) -> Self {
        ShapeError(msg.to_string())
    }
}

/// Canonical shape of `value`'s type
///
/// # Errors
///
/// Returns the error raised by the value's own `Serialize` impl.
pub fn shape_of<T: Serialize + ?Sized>(value: &T) -> Result<String, ShapeError> {
    value.serialize(ShapeProbe)
}

fn enum_shape(name: &str) -> String {
    format!("enum {}", name)
}

/// Serializer that produces a shape instead of bytes
struct ShapeProbe;

impl ser::Serializer for ShapeProbe {
    type Ok = String;
    type Error = ShapeError;

    type SerializeSeq = Opaque;
    type SerializeTuple = Positional;
    type SerializeTupleStruct = Positional;
    type SerializeTupleVariant = Opaque;
    type SerializeMap = Opaque;
    type SerializeStruct = Fields;
    type SerializeStructVariant = Opaque;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, _v: bool) -> Result<String, ShapeError> {
        Ok("bool".into())
    }

    fn serialize_i8(self, _v: i8) -> Result<String, ShapeError> {
        Ok("int".into())
    }

    fn serialize_i16(self, _v: i16) -> Result<String, ShapeError> {
        Ok("int".into())
    }

    fn serialize_i32(self, _v: i32) -> Result<String, ShapeError> {
        Ok("int".into())
    }

    fn serialize_i64(self, _v: i64) -> Result<String, ShapeError> {
        Ok("int".into())
    }

    fn serialize_i128(self, _v: i128) -> Result<String, ShapeError> {
        Ok("int".into())
    }

    fn serialize_u8(self, _v: u8) -> Result<String, ShapeError> {
        Ok("uint".into())
    }

    fn serialize_u16(self, _v: u16) -> Result<String, ShapeError> {
        Ok("uint".into())
    }

    fn serialize_u32(self, _v: u32) -> Result<String, ShapeError> {
        Ok("uint".into())
    }

    fn serialize_u64(self, _v: u64) -> Result<String, ShapeError> {
        Ok("uint".into())
    }

    fn serialize_u128(self, _v: u128) -> Result<String, ShapeError> {
        Ok("uint".into())
    }

    fn serialize_f32(self, _v: f32) -> Result<String, ShapeError> {
        Ok("float".into())
    }

    fn serialize_f64(self, _v: f64) -> Result<String, ShapeError> {
        Ok("float".into())
    }

    fn serialize_char(self, _v: char) -> Result<String, ShapeError> {
        Ok("string".into())
    }

    fn serialize_str(self, _v: &str) -> Result<String, ShapeError> {
        Ok("string".into())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, ShapeError> {
        Ok("bytes".into())
    }

    fn serialize_none(self) -> Result<String, ShapeError> {
        Ok("option".into())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _value: &T) -> Result<String, ShapeError> {
        Ok("option".into())
    }

    fn serialize_unit(self) -> Result<String, ShapeError> {
        Ok("unit".into())
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String, ShapeError> {
        Ok(name.to_string())
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<String, ShapeError> {
        Ok(enum_shape(name))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<String, ShapeError> {
        Ok(format!("{}({})", name, value.serialize(ShapeProbe)?))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, ShapeError> {
        Ok(enum_shape(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Opaque, ShapeError> {
        Ok(Opaque("seq".into()))
    }

    fn serialize_tuple(self, len: usize) -> Result<Positional, ShapeError> {
        Ok(Positional::new(None, len))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Positional, ShapeError> {
        Ok(Positional::new(Some(name), len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Opaque, ShapeError> {
        Ok(Opaque(enum_shape(name)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Opaque, ShapeError> {
        Ok(Opaque("map".into()))
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<Fields, ShapeError> {
        Ok(Fields {
            name,
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Opaque, ShapeError> {
        Ok(Opaque(enum_shape(name)))
    }
}

/// Compound whose contents do not contribute to the shape
struct Opaque(String);

impl ser::SerializeSeq for Opaque {
    type Ok = String;
    type Error = ShapeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, _value: &T) -> Result<(), ShapeError> {
        Ok(())
    }

    fn end(self) -> Result<String, ShapeError> {
        Ok(self.0)
    }
}

impl ser::SerializeMap for Opaque {
    type Ok = String;
    type Error = ShapeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, _key: &T) -> Result<(), ShapeError> {
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, _value: &T) -> Result<(), ShapeError> {
        Ok(())
    }

    fn end(self) -> Result<String, ShapeError> {
        Ok(self.0)
    }
}

impl ser::SerializeTupleVariant for Opaque {
    type Ok = String;
    type Error = ShapeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _value: &T) -> Result<(), ShapeError> {
        Ok(())
    }

    fn end(self) -> Result<String, ShapeError> {
        Ok(self.0)
    }
}

impl ser::SerializeStructVariant for Opaque {
    type Ok = String;
    type Error = ShapeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), ShapeError> {
        Ok(())
    }

    fn end(self) -> Result<String, ShapeError> {
        Ok(self.0)
    }
}

/// Tuple or tuple struct: every position recurses
struct Positional {
    name: Option<&'static str>,
    parts: Vec<String>,
}

impl Positional {
    fn new(name: Option<&'static str>, len: usize) -> Self {
        Self {
            name,
            parts: Vec::with_capacity(len),
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ShapeError> {
        self.parts.push(value.serialize(ShapeProbe)?);
        Ok(())
    }

    fn finish(self) -> String {
        format!("{}({})", self.name.unwrap_or(""), self.parts.join(","))
    }
}

impl ser::SerializeTuple for Positional {
    type Ok = String;
    type Error = ShapeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ShapeError> {
        self.push(value)
    }

    fn end(self) -> Result<String, ShapeError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for Positional {
    type Ok = String;
    type Error = ShapeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ShapeError> {
        self.push(value)
    }

    fn end(self) -> Result<String, ShapeError> {
        Ok(self.finish())
    }
}

/// Named struct: every field recurses
struct Fields {
    name: &'static str,
    fields: Vec<String>,
}

impl ser::SerializeStruct for Fields {
    type Ok = String;
    type Error = ShapeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ShapeError> {
        self.fields
            .push(format!("{}:{}", key, value.serialize(ShapeProbe)?));
        Ok(())
    }

    fn end(self) -> Result<String, ShapeError> {
        Ok(format!("{}{{{}}}", self.name, self.fields.join(",")))
    }
}
