use frost_geom::{Aabb, Vec3};
use frost_particles::{ChannelData, ChannelDesc};

use crate::error::{MeshError, MeshResult};

/// Named per-vertex or per-face data column.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshChannel {
    pub desc: ChannelDesc,
    pub data: ChannelData,
}

/// Triangle mesh with flat position/index arrays and named channels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriMesh {
    pub pos: Vec<f32>,
    pub idx: Vec<u32>,
    pub vertex_channels: Vec<MeshChannel>,
    pub face_channels: Vec<MeshChannel>,
}

/// True when any two of the three indices coincide.
#[inline]
pub fn is_degenerate_face(f: [u32; 3]) -> bool {
    f[0] == f[1] || f[1] == f[2] || f[0] == f[2]
}

impl TriMesh {
    /// Clears geometry and drops channels, keeping position/index capacity.
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.idx.clear();
        self.vertex_channels.clear();
        self.face_channels.clear();
    }

    #[inline]
    pub fn reserve(&mut self, vertices: usize, faces: usize) {
        self.pos.reserve(vertices * 3);
        self.idx.reserve(faces * 3);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.idx.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos.is_empty() && self.idx.is_empty()
    }

    #[inline]
    pub fn vertex(&self, i: usize) -> Vec3 {
        Vec3::new(self.pos[3 * i], self.pos[3 * i + 1], self.pos[3 * i + 2])
    }

    #[inline]
    pub fn face(&self, f: usize) -> [u32; 3] {
        [self.idx[3 * f], self.idx[3 * f + 1], self.idx[3 * f + 2]]
    }

    #[inline]
    pub fn push_vertex(&mut self, p: Vec3) -> u32 {
        let i = self.vertex_count() as u32;
        self.pos.extend_from_slice(&[p.x, p.y, p.z]);
        i
    }

    #[inline]
    pub fn push_face(&mut self, f: [u32; 3]) {
        self.idx.extend_from_slice(&f);
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.pos
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
    }

    pub fn faces(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.idx.chunks_exact(3).map(|f| [f[0], f[1], f[2]])
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices())
    }

    /// Post-condition check: no face repeats a vertex index.
    pub fn has_degenerate_faces(&self) -> bool {
        self.faces().any(is_degenerate_face)
    }

    /// Whether every face index refers to an existing vertex.
    pub fn indices_in_range(&self) -> bool {
        let n = self.vertex_count() as u32;
        self.idx.iter().all(|&i| i < n)
    }

    pub fn vertex_channel(&self, name: &str) -> Option<&MeshChannel> {
        self.vertex_channels.iter().find(|c| c.desc.name == name)
    }

    pub fn face_channel(&self, name: &str) -> Option<&MeshChannel> {
        self.face_channels.iter().find(|c| c.desc.name == name)
    }

    /// Adds (or replaces) a vertex channel; `data` must hold one element per vertex.
    pub fn set_vertex_channel(&mut self, desc: ChannelDesc, data: ChannelData) -> MeshResult<()> {
        if data.value_count() != self.vertex_count() * desc.arity {
            return Err(MeshError::Channel(desc.name));
        }
        self.vertex_channels.retain(|c| c.desc.name != desc.name);
        self.vertex_channels.push(MeshChannel { desc, data });
        Ok(())
    }

    /// Adds (or replaces) a face channel; `data` must hold one element per face.
    pub fn set_face_channel(&mut self, desc: ChannelDesc, data: ChannelData) -> MeshResult<()> {
        if data.value_count() != self.face_count() * desc.arity {
            return Err(MeshError::Channel(desc.name));
        }
        self.face_channels.retain(|c| c.desc.name != desc.name);
        self.face_channels.push(MeshChannel { desc, data });
        Ok(())
    }

    pub fn remove_vertex_channel(&mut self, name: &str) {
        self.vertex_channels.retain(|c| c.desc.name != name);
    }

    /// Keeps faces where `keep[f]` is true, then drops unreferenced vertices.
    pub fn retain_faces(&mut self, keep: &[bool]) {
        let kept: Vec<u32> = (0..self.face_count() as u32)
            .filter(|&f| keep.get(f as usize).copied().unwrap_or(false))
            .collect();
        if kept.len() == self.face_count() {
            return;
        }
        let mut idx = Vec::with_capacity(kept.len() * 3);
        for &f in &kept {
            idx.extend_from_slice(&self.face(f as usize));
        }
        self.idx = idx;
        for ch in &mut self.face_channels {
            ch.data = ch.data.gather(&kept, ch.desc.arity);
        }
        self.compact_vertices();
    }

    /// Drops faces past `max_faces`. Returns how many were removed.
    pub fn truncate_faces(&mut self, max_faces: usize) -> usize {
        let n = self.face_count();
        if n <= max_faces {
            return 0;
        }
        self.idx.truncate(max_faces * 3);
        for ch in &mut self.face_channels {
            ch.data.truncate(max_faces * ch.desc.arity);
        }
        self.compact_vertices();
        n - max_faces
    }

    /// Keeps vertices where `keep[v]` is true. Only meaningful for point
    /// clouds; faces referencing a dropped vertex are dropped with it.
    pub fn retain_vertices(&mut self, keep: &[bool]) {
        let n = self.vertex_count();
        let order: Vec<u32> = (0..n as u32)
            .filter(|&v| keep.get(v as usize).copied().unwrap_or(false))
            .collect();
        if order.len() == n {
            return;
        }
        let mut remap = vec![u32::MAX; n];
        for (k, &v) in order.iter().enumerate() {
            remap[v as usize] = k as u32;
        }
        let kept_faces: Vec<bool> = self
            .faces()
            .map(|f| f.iter().all(|&i| remap[i as usize] != u32::MAX))
            .collect();
        if kept_faces.iter().any(|k| !k) {
            let kept: Vec<u32> = (0..kept_faces.len() as u32)
                .filter(|&f| kept_faces[f as usize])
                .collect();
            let mut idx = Vec::with_capacity(kept.len() * 3);
            for &f in &kept {
                idx.extend_from_slice(&self.face(f as usize));
            }
            self.idx = idx;
            for ch in &mut self.face_channels {
                ch.data = ch.data.gather(&kept, ch.desc.arity);
            }
        }
        for i in self.idx.iter_mut() {
            *i = remap[*i as usize];
        }
        let mut pos = Vec::with_capacity(order.len() * 3);
        for &v in &order {
            let v = v as usize;
            pos.extend_from_slice(&self.pos[3 * v..3 * v + 3]);
        }
        self.pos = pos;
        for ch in &mut self.vertex_channels {
            ch.data = ch.data.gather(&order, ch.desc.arity);
        }
    }

    /// Removes vertices no face references, remapping indices and channels.
    pub fn compact_vertices(&mut self) {
        let n = self.vertex_count();
        let mut remap = vec![u32::MAX; n];
        let mut order: Vec<u32> = Vec::with_capacity(n);
        for i in self.idx.iter_mut() {
            let slot = &mut remap[*i as usize];
            if *slot == u32::MAX {
                *slot = order.len() as u32;
                order.push(*i);
            }
            *i = *slot;
        }
        if order.len() == n && order.iter().enumerate().all(|(k, &v)| k as u32 == v) {
            return;
        }
        let mut pos = Vec::with_capacity(order.len() * 3);
        for &v in &order {
            let v = v as usize;
            pos.extend_from_slice(&self.pos[3 * v..3 * v + 3]);
        }
        self.pos = pos;
        for ch in &mut self.vertex_channels {
            ch.data = ch.data.gather(&order, ch.desc.arity);
        }
    }
}
