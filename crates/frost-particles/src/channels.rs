//! Named, typed channel descriptors and their column storage.

use std::fmt;

use crate::error::{ParticleError, ParticleResult};

/// Well-known channel names.
pub mod names {
    pub const POSITION: &str = "Position";
    pub const RADIUS: &str = "Radius";
    pub const ID: &str = "ID";
    pub const VELOCITY: &str = "Velocity";
    pub const MTL_INDEX: &str = "MtlIndex";
    pub const AGE: &str = "Age";
    pub const LIFE_SPAN: &str = "LifeSpan";
    pub const COLOR: &str = "Color";
    pub const SHAPE_INDEX: &str = "ShapeIndex";
    pub const ORIENTATION: &str = "Orientation";
    /// Per-face material id on output meshes.
    pub const MATERIAL_ID: &str = "MaterialID";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl DataType {
    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelDesc {
    pub name: String,
    pub data_type: DataType,
    pub arity: usize,
}

impl ChannelDesc {
    pub fn new(name: impl Into<String>, data_type: DataType, arity: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            arity,
        }
    }
}

/// Ordered set of channel descriptors, unique by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelMap {
    channels: Vec<ChannelDesc>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ChannelMap::push`]; later duplicates replace earlier ones.
    pub fn with(mut self, name: &str, data_type: DataType, arity: usize) -> Self {
        self.channels.retain(|c| c.name != name);
        self.channels.push(ChannelDesc::new(name, data_type, arity));
        self
    }

    /// Adds a channel. Re-adding an identical descriptor is a no-op.
    pub fn push(&mut self, desc: ChannelDesc) -> ParticleResult<()> {
        match self.get(&desc.name) {
            Some(existing) if *existing == desc => Ok(()),
            Some(_) => Err(ParticleError::ChannelConflict(desc.name)),
            None => {
                self.channels.push(desc);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ChannelDesc> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// Descriptor at position `i`; panics when out of range like slice indexing.
    #[inline]
    pub fn at(&self, i: usize) -> &ChannelDesc {
        &self.channels[i]
    }

    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.channels.retain(|c| c.name != name);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelDesc> {
        self.channels.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Verifies `name` exists with the given arity and a float element type.
    pub fn require_float(&self, name: &str, arity: usize) -> ParticleResult<()> {
        let desc = self
            .get(name)
            .ok_or_else(|| ParticleError::MissingChannel(name.to_string()))?;
        if desc.arity != arity {
            return Err(ParticleError::ChannelArity {
                name: name.to_string(),
                expected: arity,
                actual: desc.arity,
            });
        }
        if !desc.data_type.is_float() {
            return Err(ParticleError::ChannelType {
                name: name.to_string(),
                expected: "float",
                actual: desc.data_type,
            });
        }
        Ok(())
    }
}

/// Flat column of channel values; element `i` occupies `[i*arity, (i+1)*arity)`.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

macro_rules! each_column {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ChannelData::F32($v) => $body,
            ChannelData::F64($v) => $body,
            ChannelData::I8($v) => $body,
            ChannelData::I16($v) => $body,
            ChannelData::I32($v) => $body,
            ChannelData::I64($v) => $body,
            ChannelData::U8($v) => $body,
            ChannelData::U16($v) => $body,
            ChannelData::U32($v) => $body,
            ChannelData::U64($v) => $body,
        }
    };
}

impl ChannelData {
    pub fn with_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Float32 => ChannelData::F32(Vec::new()),
            DataType::Float64 => ChannelData::F64(Vec::new()),
            DataType::Int8 => ChannelData::I8(Vec::new()),
            DataType::Int16 => ChannelData::I16(Vec::new()),
            DataType::Int32 => ChannelData::I32(Vec::new()),
            DataType::Int64 => ChannelData::I64(Vec::new()),
            DataType::UInt8 => ChannelData::U8(Vec::new()),
            DataType::UInt16 => ChannelData::U16(Vec::new()),
            DataType::UInt32 => ChannelData::U32(Vec::new()),
            DataType::UInt64 => ChannelData::U64(Vec::new()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ChannelData::F32(_) => DataType::Float32,
            ChannelData::F64(_) => DataType::Float64,
            ChannelData::I8(_) => DataType::Int8,
            ChannelData::I16(_) => DataType::Int16,
            ChannelData::I32(_) => DataType::Int32,
            ChannelData::I64(_) => DataType::Int64,
            ChannelData::U8(_) => DataType::UInt8,
            ChannelData::U16(_) => DataType::UInt16,
            ChannelData::U32(_) => DataType::UInt32,
            ChannelData::U64(_) => DataType::UInt64,
        }
    }

    /// Number of scalar values (elements times arity).
    #[inline]
    pub fn value_count(&self) -> usize {
        each_column!(self, v => v.len())
    }

    pub fn clear(&mut self) {
        each_column!(self, v => v.clear())
    }

    pub fn truncate(&mut self, values: usize) {
        each_column!(self, v => v.truncate(values))
    }

    pub fn reserve(&mut self, values: usize) {
        each_column!(self, v => v.reserve(values))
    }

    /// Scalar at flat index `k`, widened to f64.
    #[inline]
    pub fn get_f64(&self, k: usize) -> f64 {
        each_column!(self, v => v[k] as f64)
    }

    /// Scalar at flat index `k` as an integer; floats are rounded.
    #[inline]
    pub fn get_i64(&self, k: usize) -> i64 {
        match self {
            ChannelData::F32(v) => v[k].round() as i64,
            ChannelData::F64(v) => v[k].round() as i64,
            other => each_column!(other, v => v[k] as i64),
        }
    }

    /// Appends one scalar converted from f64 with `as` semantics (saturating).
    #[inline]
    pub fn push_f64(&mut self, x: f64) {
        match self {
            ChannelData::F32(v) => v.push(x as f32),
            ChannelData::F64(v) => v.push(x),
            ChannelData::I8(v) => v.push(x.round() as i8),
            ChannelData::I16(v) => v.push(x.round() as i16),
            ChannelData::I32(v) => v.push(x.round() as i32),
            ChannelData::I64(v) => v.push(x.round() as i64),
            ChannelData::U8(v) => v.push(x.round() as u8),
            ChannelData::U16(v) => v.push(x.round() as u16),
            ChannelData::U32(v) => v.push(x.round() as u32),
            ChannelData::U64(v) => v.push(x.round() as u64),
        }
    }

    #[inline]
    pub fn set_f64(&mut self, k: usize, x: f64) {
        match self {
            ChannelData::F32(v) => v[k] = x as f32,
            ChannelData::F64(v) => v[k] = x,
            ChannelData::I8(v) => v[k] = x.round() as i8,
            ChannelData::I16(v) => v[k] = x.round() as i16,
            ChannelData::I32(v) => v[k] = x.round() as i32,
            ChannelData::I64(v) => v[k] = x.round() as i64,
            ChannelData::U8(v) => v[k] = x.round() as u8,
            ChannelData::U16(v) => v[k] = x.round() as u16,
            ChannelData::U32(v) => v[k] = x.round() as u32,
            ChannelData::U64(v) => v[k] = x.round() as u64,
        }
    }

    /// Appends the values `[start, start+count)` of `src`, converting when the types differ.
    pub fn extend_from(&mut self, src: &ChannelData, start: usize, count: usize) {
        macro_rules! same {
            ($($var:ident),*) => {
                match (&mut *self, src) {
                    $((ChannelData::$var(d), ChannelData::$var(s)) => {
                        d.extend_from_slice(&s[start..start + count]);
                        return;
                    })*
                    _ => {}
                }
            };
        }
        same!(F32, F64, I8, I16, I32, I64, U8, U16, U32, U64);
        for k in start..start + count {
            self.push_f64(src.get_f64(k));
        }
    }

    /// New column holding elements `indices` (each `arity` wide) in that order.
    pub fn gather(&self, indices: &[u32], arity: usize) -> ChannelData {
        let mut out = ChannelData::with_type(self.data_type());
        out.reserve(indices.len() * arity);
        for &i in indices {
            out.extend_from(self, i as usize * arity, arity);
        }
        out
    }

    #[inline]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            ChannelData::F32(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f32_mut(&mut self) -> Option<&mut Vec<f32>> {
        match self {
            ChannelData::F32(v) => Some(v),
            _ => None,
        }
    }
}
