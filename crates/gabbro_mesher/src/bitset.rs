use glam::IVec3;

use gabbro_shared::columns::ColumnStore;
use gabbro_shared::coords::{CHUNK_SIZE, CHUNK_SIZE_I32};

const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;

/// Whether the cell at (x, y, z) blocks the face of a neighbouring voxel.
/// Out-of-footprint probes are open air. With `seen_from_above`, cells
/// beneath a column's lowest stored voxel count as solid: the generator
/// trimmed them away precisely because no camera above the terrain can see
/// them (the literal test is `y < min_y` of the probed column).
pub fn probe_solid(store: &ColumnStore, x: i32, y: i32, z: i32, seen_from_above: bool) -> bool {
    if !store.in_bounds(x, z) {
        return false;
    }
    if store.get_voxel(x, y, z) != 0 {
        return true;
    }
    seen_from_above && y < store.min_y(x, z)
}

/// Per-chunk solidity scratch: for each sweep axis, a 64x64 grid of 64-bit
/// rows whose bits run along the axis, plus one bit pair per row marking
/// whether the neighbouring slab at axis position -1 / 64 is solid.
///
/// Row indexing is `[height][width]` with the axis conventions of
/// `gabbro_shared::coords`: `rows[x][y][z]` bit x, `rows[z][y][x]` bit z,
/// `rows[y][z][x]` bit y.
pub struct ChunkBitset {
    rows: Box<[u64]>,
    side_lo: Box<[u64]>,
    side_hi: Box<[u64]>,
}

impl ChunkBitset {
    pub fn new() -> Self {
        Self {
            rows: vec![0; 3 * CHUNK_AREA].into_boxed_slice(),
            side_lo: vec![0; 3 * CHUNK_SIZE].into_boxed_slice(),
            side_hi: vec![0; 3 * CHUNK_SIZE].into_boxed_slice(),
        }
    }

    pub fn clear(&mut self) {
        self.rows.fill(0);
        self.side_lo.fill(0);
        self.side_hi.fill(0);
    }

    fn row_index(axis: usize, height: usize, width: usize) -> usize {
        axis * CHUNK_AREA + height * CHUNK_SIZE + width
    }

    pub fn set_voxel(&mut self, lx: usize, ly: usize, lz: usize) {
        debug_assert!(lx < CHUNK_SIZE && ly < CHUNK_SIZE && lz < CHUNK_SIZE);
        self.rows[Self::row_index(0, ly, lz)] |= 1 << lx;
        self.rows[Self::row_index(1, ly, lx)] |= 1 << lz;
        self.rows[Self::row_index(2, lz, lx)] |= 1 << ly;
    }

    pub fn row(&self, axis: usize, height: usize, width: usize) -> u64 {
        self.rows[Self::row_index(axis, height, width)]
    }

    /// Neighbour-slab solidity for one row: bit 0 of each value is the
    /// cell at axis position -1 / 64 respectively.
    pub fn side_bits(&self, axis: usize, height: usize, width: usize) -> (u64, u64) {
        let word = axis * CHUNK_SIZE + height;
        (
            (self.side_lo[word] >> width) & 1,
            (self.side_hi[word] >> width) & 1,
        )
    }

    /// Populate rows and side masks for the chunk based at `base` (minimum
    /// world corner). The scratch must be cleared beforehand.
    pub fn fill(&mut self, store: &ColumnStore, base: IVec3, seen_from_above: bool) {
        for lx in 0..CHUNK_SIZE {
            let wx = base.x + lx as i32;
            for lz in 0..CHUNK_SIZE {
                let wz = base.z + lz as i32;
                if !store.in_bounds(wx, wz) {
                    continue;
                }
                for cell in store.column(wx, wz) {
                    let ly = cell.y - base.y;
                    if (0..CHUNK_SIZE_I32).contains(&ly) {
                        self.set_voxel(lx, ly as usize, lz);
                    }
                }
            }
        }

        for height in 0..CHUNK_SIZE {
            let h = height as i32;
            for width in 0..CHUNK_SIZE {
                let w = width as i32;
                let word = height;
                let bit = 1u64 << width;

                // Axis x: height is y, width is z.
                if probe_solid(store, base.x - 1, base.y + h, base.z + w, seen_from_above) {
                    self.side_lo[word] |= bit;
                }
                if probe_solid(
                    store,
                    base.x + CHUNK_SIZE_I32,
                    base.y + h,
                    base.z + w,
                    seen_from_above,
                ) {
                    self.side_hi[word] |= bit;
                }

                // Axis z: height is y, width is x.
                if probe_solid(store, base.x + w, base.y + h, base.z - 1, seen_from_above) {
                    self.side_lo[CHUNK_SIZE + word] |= bit;
                }
                if probe_solid(
                    store,
                    base.x + w,
                    base.y + h,
                    base.z + CHUNK_SIZE_I32,
                    seen_from_above,
                ) {
                    self.side_hi[CHUNK_SIZE + word] |= bit;
                }

                // Axis y: height is z, width is x.
                if probe_solid(store, base.x + w, base.y - 1, base.z + h, seen_from_above) {
                    self.side_lo[2 * CHUNK_SIZE + word] |= bit;
                }
                if probe_solid(
                    store,
                    base.x + w,
                    base.y + CHUNK_SIZE_I32,
                    base.z + h,
                    seen_from_above,
                ) {
                    self.side_hi[2 * CHUNK_SIZE + word] |= bit;
                }
            }
        }
    }
}

impl Default for ChunkBitset {
    fn default() -> Self {
        Self::new()
    }
}
