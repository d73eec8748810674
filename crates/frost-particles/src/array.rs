//! Struct-of-arrays particle storage.

use frost_geom::Vec3;
use hashbrown::HashMap;

use crate::channels::{ChannelData, ChannelDesc, ChannelMap, names};
use crate::error::{ParticleError, ParticleResult};

/// Per-channel fill values used when a requested channel has no source data.
pub type DefaultValues = HashMap<String, Vec<f64>>;

/// Owned particle buffer: one typed column per channel of its map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleArray {
    map: ChannelMap,
    columns: Vec<ChannelData>,
    len: usize,
}

impl ParticleArray {
    pub fn new(map: ChannelMap) -> Self {
        let columns = map
            .iter()
            .map(|d| ChannelData::with_type(d.data_type))
            .collect();
        Self {
            map,
            columns,
            len: 0,
        }
    }

    /// Wraps existing columns (one per map entry, same order).
    pub fn from_columns(map: ChannelMap, columns: Vec<ChannelData>) -> ParticleResult<Self> {
        if columns.len() != map.len() {
            return Err(ParticleError::ColumnLength {
                name: "<columns>".to_string(),
                expected: map.len(),
                actual: columns.len(),
            });
        }
        let mut len = None;
        for (desc, col) in map.iter().zip(&columns) {
            if col.data_type() != desc.data_type {
                return Err(ParticleError::ChannelType {
                    name: desc.name.clone(),
                    expected: desc.data_type.name(),
                    actual: col.data_type(),
                });
            }
            let n = col.value_count() / desc.arity.max(1);
            let expected = *len.get_or_insert(n);
            if col.value_count() != expected * desc.arity {
                return Err(ParticleError::ColumnLength {
                    name: desc.name.clone(),
                    expected: expected * desc.arity,
                    actual: col.value_count(),
                });
            }
        }
        Ok(Self {
            map,
            columns,
            len: len.unwrap_or(0),
        })
    }

    #[inline]
    pub fn channel_map(&self) -> &ChannelMap {
        &self.map
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops all particles but keeps the map and column capacity.
    pub fn clear(&mut self) {
        for c in &mut self.columns {
            c.clear();
        }
        self.len = 0;
    }

    pub fn column(&self, name: &str) -> Option<&ChannelData> {
        self.map.index_of(name).map(|i| &self.columns[i])
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ChannelData> {
        self.map.index_of(name).map(move |i| &mut self.columns[i])
    }

    pub fn arity(&self, name: &str) -> Option<usize> {
        self.map.get(name).map(|d| d.arity)
    }

    /// Adds a zero-filled channel. Existing identical channels are left untouched.
    pub fn add_channel(&mut self, desc: ChannelDesc) -> ParticleResult<()> {
        if self.map.has(&desc.name) {
            return self.map.push(desc);
        }
        let mut col = ChannelData::with_type(desc.data_type);
        for _ in 0..self.len * desc.arity {
            col.push_f64(0.0);
        }
        self.columns.push(col);
        self.map.push(desc)
    }

    pub fn remove_channel(&mut self, name: &str) {
        if let Some(i) = self.map.index_of(name) {
            self.columns.remove(i);
            self.map.remove(name);
        }
    }

    /// A float32 column of the given arity.
    pub fn f32_column(&self, name: &str, arity: usize) -> ParticleResult<&[f32]> {
        self.check_f32(name, arity)?;
        self.column(name)
            .and_then(ChannelData::as_f32)
            .ok_or_else(|| ParticleError::MissingChannel(name.to_string()))
    }

    pub fn f32_column_mut(&mut self, name: &str, arity: usize) -> ParticleResult<&mut Vec<f32>> {
        self.check_f32(name, arity)?;
        self.column_mut(name)
            .and_then(ChannelData::as_f32_mut)
            .ok_or_else(|| ParticleError::MissingChannel(name.to_string()))
    }

    fn check_f32(&self, name: &str, arity: usize) -> ParticleResult<()> {
        let desc = self
            .map
            .get(name)
            .ok_or_else(|| ParticleError::MissingChannel(name.to_string()))?;
        if desc.arity != arity {
            return Err(ParticleError::ChannelArity {
                name: name.to_string(),
                expected: arity,
                actual: desc.arity,
            });
        }
        if desc.data_type != crate::DataType::Float32 {
            return Err(ParticleError::ChannelType {
                name: name.to_string(),
                expected: "float32",
                actual: desc.data_type,
            });
        }
        Ok(())
    }

    /// Positions as `Vec3`s. Requires a float32x3 `Position` channel.
    pub fn positions(&self) -> ParticleResult<Vec<Vec3>> {
        let raw = self.f32_column(names::POSITION, 3)?;
        Ok(raw
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect())
    }

    pub fn radii(&self) -> ParticleResult<&[f32]> {
        self.f32_column(names::RADIUS, 1)
    }

    /// Appends particle `i` of `src`, matching channels by name.
    /// Channels absent from `src` (or with another arity) take `defaults` or zero.
    pub fn push_from(&mut self, src: &ParticleArray, i: usize, defaults: &DefaultValues) {
        for (desc, col) in self.map.iter().zip(self.columns.iter_mut()) {
            let arity = desc.arity;
            match src.map.index_of(&desc.name) {
                Some(j) if src.map.at(j).arity == arity => {
                    col.extend_from(&src.columns[j], i * arity, arity);
                }
                _ => {
                    let fill = defaults.get(&desc.name);
                    for k in 0..arity {
                        let v = fill.and_then(|f| f.get(k)).copied().unwrap_or(0.0);
                        col.push_f64(v);
                    }
                }
            }
        }
        self.len += 1;
    }

    /// Keeps particles `indices`, in that order.
    pub fn gather(&self, indices: &[u32]) -> ParticleArray {
        let columns = self
            .map
            .iter()
            .zip(self.columns.iter())
            .map(|(d, c)| c.gather(indices, d.arity))
            .collect();
        ParticleArray {
            map: self.map.clone(),
            columns,
            len: indices.len(),
        }
    }

    /// Retains particles for which `keep(i)` is true; returns how many were removed.
    pub fn retain<F: FnMut(usize) -> bool>(&mut self, mut keep: F) -> usize {
        let kept: Vec<u32> = (0..self.len)
            .filter(|&i| keep(i))
            .map(|i| i as u32)
            .collect();
        let removed = self.len - kept.len();
        if removed > 0 {
            *self = self.gather(&kept);
        }
        removed
    }
}
