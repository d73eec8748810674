//! Cube-to-tetrahedra split used by the surface extractor.
//!
//! Corner `c` of a cell sits at offset `(c & 1, (c >> 1) & 1, (c >> 2) & 1)`.
//! Every tetrahedron runs from corner 0 to corner 7 along one axis at a time,
//! so all six share the main diagonal and neighbouring cells split their
//! shared faces the same way.

use std::sync::OnceLock;

pub type Tet = [u8; 4];

const AXIS_BITS: [u8; 3] = [1, 2, 4];

fn gen_tets() -> [Tet; 6] {
    let mut out = [[0u8; 4]; 6];
    let mut n = 0;
    for &a in &AXIS_BITS {
        for &b in &AXIS_BITS {
            if a == b {
                continue;
            }
            out[n] = [0, a, a | b, 7];
            n += 1;
        }
    }
    out
}

static TETS: OnceLock<[Tet; 6]> = OnceLock::new();

/// The six tetrahedra of a cell; within each, corners are ordered by inclusion.
#[inline]
pub fn cell_tets() -> &'static [Tet; 6] {
    TETS.get_or_init(gen_tets)
}

/// Corner offset in cells.
#[inline]
pub const fn corner_offset(c: u8) -> [i32; 3] {
    [(c & 1) as i32, ((c >> 1) & 1) as i32, ((c >> 2) & 1) as i32]
}

/// Orders an edge so the first corner's offset bits are a subset of the second's.
/// Every tetrahedron edge satisfies this after ordering.
#[inline]
pub fn canonical_edge(a: u8, b: u8) -> (u8, u8) {
    if a & b == a { (a, b) } else { (b, a) }
}
