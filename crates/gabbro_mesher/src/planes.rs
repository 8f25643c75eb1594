use glam::IVec3;

use gabbro_shared::columns::ColumnStore;
use gabbro_shared::coords::{normal_index, CHUNK_SIZE};

use crate::bitset::ChunkBitset;
use crate::merger::MergeStrategy;

const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;
const NO_INDEX: u16 = u16::MAX;

/// Dense `merge id -> plane index` table for one job tile. At most 256
/// distinct ids exist, so the table is a flat array.
pub struct IdTable {
    index_of: [u16; 256],
    ids: Vec<u8>,
}

impl IdTable {
    /// Scan every column of the job's horizontal range and register each
    /// merge id encountered, in first-seen order.
    pub fn build<M: MergeStrategy>(
        store: &ColumnStore,
        merger: &M,
        x_range: std::ops::Range<i32>,
        z_range: std::ops::Range<i32>,
    ) -> Self {
        let mut table = Self {
            index_of: [NO_INDEX; 256],
            ids: Vec::new(),
        };

        for x in x_range {
            for z in z_range.clone() {
                for cell in store.column(x, z) {
                    let id = merger.merge_id(cell.id);
                    debug_assert!(id != 0, "stored voxels must map to a merge id");
                    if table.index_of[id as usize] == NO_INDEX {
                        table.index_of[id as usize] = table.ids.len() as u16;
                        table.ids.push(id);
                    }
                }
            }
        }

        table
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, id: u8) -> usize {
        debug_assert!(self.index_of[id as usize] != NO_INDEX, "unregistered id {id}");
        self.index_of[id as usize] as usize
    }

    pub fn id_at(&self, index: usize) -> u8 {
        self.ids[index]
    }
}

/// Per-chunk visible-face bitmasks, one 64x64 plane of 64-bit rows per
/// (normal, merge id, depth). Plane words are indexed `[depth][row]` with
/// the rectangle's width coordinate in the bits; a per-(normal, id)
/// occupancy word records which depths hold any face so packing can skip
/// the rest. The greedy packer consumes every bit it reads, so after a
/// chunk is packed the whole array is zero again without a memset.
pub struct FacePlanes {
    id_count: usize,
    words: Box<[u64]>,
    occupancy: Box<[u64]>,
}

impl FacePlanes {
    pub fn new(id_count: usize) -> Self {
        Self {
            id_count,
            words: vec![0; 6 * id_count * CHUNK_AREA].into_boxed_slice(),
            occupancy: vec![0; 6 * id_count].into_boxed_slice(),
        }
    }

    pub fn id_count(&self) -> usize {
        self.id_count
    }

    fn plane_offset(&self, normal: u32, id_index: usize, depth: usize) -> usize {
        ((normal as usize * self.id_count + id_index) * CHUNK_SIZE + depth) * CHUNK_SIZE
    }

    pub fn mark(&mut self, normal: u32, id_index: usize, depth: usize, row: usize, bit: usize) {
        let offset = self.plane_offset(normal, id_index, depth);
        self.words[offset + row] |= 1 << bit;
        self.occupancy[normal as usize * self.id_count + id_index] |= 1 << depth;
    }

    pub fn plane_mut(&mut self, normal: u32, id_index: usize, depth: usize) -> &mut [u64] {
        let offset = self.plane_offset(normal, id_index, depth);
        &mut self.words[offset..offset + CHUNK_SIZE]
    }

    /// Clear and return the depth-occupancy word for (normal, id).
    pub fn take_occupancy(&mut self, normal: u32, id_index: usize) -> u64 {
        std::mem::take(&mut self.occupancy[normal as usize * self.id_count + id_index])
    }
}

/// Map a plane-local position back to the world cell it describes:
/// `depth` runs along the sweep axis, `width`/`height` along the axis
/// conventions of `gabbro_shared::coords`.
pub fn plane_to_world(base: IVec3, axis: usize, depth: i32, width: i32, height: i32) -> IVec3 {
    match axis {
        0 => IVec3::new(base.x + depth, base.y + height, base.z + width),
        1 => IVec3::new(base.x + width, base.y + height, base.z + depth),
        _ => IVec3::new(base.x + width, base.y + depth, base.z + height),
    }
}

/// Derive the visible-face planes of one chunk from its solidity bitset.
/// With `seen_from_above`, a face looking into a cell beneath the lowest
/// stored voxel of that cell's column is dropped (the literal test is
/// `next.y < min_y`): trimmed columns hide everything under their floor,
/// and no camera above the terrain can see such a face anyway.
pub fn extract_chunk<M: MergeStrategy>(
    planes: &mut FacePlanes,
    bits: &ChunkBitset,
    store: &ColumnStore,
    ids: &IdTable,
    merger: &M,
    base: IVec3,
    seen_from_above: bool,
) {
    for axis in 0..3 {
        for height in 0..CHUNK_SIZE {
            for width in 0..CHUNK_SIZE {
                let row = bits.row(axis, height, width);
                if row == 0 {
                    continue;
                }
                let (lo, hi) = bits.side_bits(axis, height, width);

                // Positive faces: solid with an empty cell one step up-axis.
                let shifted = (row >> 1) | (hi << 63);
                mark_faces(
                    planes,
                    store,
                    ids,
                    merger,
                    base,
                    axis,
                    normal_index(axis, false),
                    width,
                    height,
                    row & !shifted,
                    seen_from_above,
                );

                // Negative faces: solid with an empty cell one step down-axis.
                let shifted = (row << 1) | lo;
                mark_faces(
                    planes,
                    store,
                    ids,
                    merger,
                    base,
                    axis,
                    normal_index(axis, true),
                    width,
                    height,
                    row & !shifted,
                    seen_from_above,
                );
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn mark_faces<M: MergeStrategy>(
    planes: &mut FacePlanes,
    store: &ColumnStore,
    ids: &IdTable,
    merger: &M,
    base: IVec3,
    axis: usize,
    normal: u32,
    width: usize,
    height: usize,
    mut face_bits: u64,
    seen_from_above: bool,
) {
    let step = if normal >= 3 { -1 } else { 1 };

    while face_bits != 0 {
        let depth = face_bits.trailing_zeros() as usize;
        face_bits &= face_bits - 1;

        let cell = plane_to_world(base, axis, depth as i32, width as i32, height as i32);
        if seen_from_above {
            let mut next = cell;
            match axis {
                0 => next.x += step,
                1 => next.z += step,
                _ => next.y += step,
            }
            if store.in_bounds(next.x, next.z) && next.y < store.min_y(next.x, next.z) {
                continue;
            }
        }

        let raw = store.get_voxel(cell.x, cell.y, cell.z);
        debug_assert!(raw != 0, "face bit without a stored voxel at {cell:?}");
        let id = merger.merge_id(raw);
        planes.mark(normal, ids.index_of(id), depth, height, width);
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use gabbro_shared::columns::{ColumnStore, ColumnVoxel};
    use gabbro_shared::coords::CHUNK_SIZE;

    use super::{extract_chunk, FacePlanes, IdTable};
    use crate::bitset::ChunkBitset;
    use crate::merger::IdentityMerger;

    fn plane_bit_count(planes: &mut FacePlanes, normal: u32, id_index: usize) -> u32 {
        let mut total = 0;
        for depth in 0..CHUNK_SIZE {
            for word in planes.plane_mut(normal, id_index, depth).iter() {
                total += word.count_ones();
            }
        }
        total
    }

    #[test]
    fn id_table_registers_ids_in_first_seen_order() {
        let store = ColumnStore::new(
            2,
            1,
            vec![ColumnVoxel::new(0, 9), ColumnVoxel::new(0, 4)],
            vec![0, 1, 2],
        );
        let table = IdTable::build(&store, &IdentityMerger, 0..2, 0..1);

        assert_eq!(table.len(), 2);
        assert_eq!(table.id_at(0), 9);
        assert_eq!(table.id_at(1), 4);
        assert_eq!(table.index_of(9), 0);
        assert_eq!(table.index_of(4), 1);
    }

    #[test]
    fn lone_voxel_yields_one_face_per_normal() {
        let store = ColumnStore::new(1, 1, vec![ColumnVoxel::new(0, 1)], vec![0, 1]);
        let table = IdTable::build(&store, &IdentityMerger, 0..1, 0..1);
        let mut bits = ChunkBitset::new();
        bits.fill(&store, IVec3::ZERO, false);
        let mut planes = FacePlanes::new(table.len());

        extract_chunk(&mut planes, &bits, &store, &table, &IdentityMerger, IVec3::ZERO, false);

        for normal in 0..6 {
            assert_eq!(plane_bit_count(&mut planes, normal, 0), 1, "normal {normal}");
        }
    }

    #[test]
    fn touching_voxels_hide_their_shared_faces() {
        let store = ColumnStore::new(
            2,
            1,
            vec![ColumnVoxel::new(0, 1), ColumnVoxel::new(0, 1)],
            vec![0, 1, 2],
        );
        let table = IdTable::build(&store, &IdentityMerger, 0..2, 0..1);
        let mut bits = ChunkBitset::new();
        bits.fill(&store, IVec3::ZERO, false);
        let mut planes = FacePlanes::new(table.len());

        extract_chunk(&mut planes, &bits, &store, &table, &IdentityMerger, IVec3::ZERO, false);

        let mut total = 0;
        for normal in 0..6 {
            total += plane_bit_count(&mut planes, normal, 0);
        }
        // Two cubes share one interior boundary: 12 - 2 faces survive.
        assert_eq!(total, 10);
    }

    #[test]
    fn different_ids_split_across_their_own_planes() {
        let store = ColumnStore::new(
            2,
            1,
            vec![ColumnVoxel::new(0, 1), ColumnVoxel::new(0, 2)],
            vec![0, 1, 2],
        );
        let table = IdTable::build(&store, &IdentityMerger, 0..2, 0..1);
        let mut bits = ChunkBitset::new();
        bits.fill(&store, IVec3::ZERO, false);
        let mut planes = FacePlanes::new(table.len());

        extract_chunk(&mut planes, &bits, &store, &table, &IdentityMerger, IVec3::ZERO, false);

        let mut per_id = [0u32; 2];
        for id_index in 0..2 {
            for normal in 0..6 {
                per_id[id_index] += plane_bit_count(&mut planes, normal, id_index);
            }
        }
        // The shared boundary produces no face on either side.
        assert_eq!(per_id, [5, 5]);
    }

    #[test]
    fn side_mask_hides_faces_at_the_chunk_seam() {
        // Columns at x 63 and 64: the face between them must vanish from
        // the chunk based at the origin.
        let store = ColumnStore::new(
            65,
            1,
            vec![ColumnVoxel::new(0, 1), ColumnVoxel::new(0, 1)],
            {
                let mut prefix = vec![0u32; 64];
                prefix.push(1);
                prefix.push(2);
                prefix
            },
        );
        let table = IdTable::build(&store, &IdentityMerger, 0..65, 0..1);
        let mut bits = ChunkBitset::new();
        bits.fill(&store, IVec3::ZERO, false);
        let mut planes = FacePlanes::new(table.len());

        extract_chunk(&mut planes, &bits, &store, &table, &IdentityMerger, IVec3::ZERO, false);

        // +x of the x = 63 voxel is suppressed by the side mask; its five
        // other faces survive.
        let mut total = 0;
        for normal in 0..6 {
            total += plane_bit_count(&mut planes, normal, 0);
        }
        assert_eq!(total, 5);
    }
}
