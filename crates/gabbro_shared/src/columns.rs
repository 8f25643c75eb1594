use bytemuck::{Pod, Zeroable};

use crate::coords::{MAX_HORIZONTAL_COORD, MAX_VERTICAL_COORD};
use crate::error::TerrainError;

/// One stored cell of a column: height plus the 8-bit block id. Padded to
/// an 8-byte stride so the persisted layout can be memory-mapped directly.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ColumnVoxel {
    pub y: i32,
    pub id: u8,
    pub _pad: [u8; 3],
}

const _: [(); 8] = [(); std::mem::size_of::<ColumnVoxel>()];

impl ColumnVoxel {
    pub fn new(y: i32, id: u8) -> Self {
        Self { y, id, _pad: [0; 3] }
    }
}

/// Read-only sparse voxel world: for every (x, z) column an ascending run
/// of (y, id) cells, all columns packed flat behind a prefix index.
/// Column k owns `voxels[start_index[k]..start_index[k + 1]]`.
#[derive(Debug, Clone)]
pub struct ColumnStore {
    size_x: u32,
    size_z: u32,
    voxels: Vec<ColumnVoxel>,
    start_index: Vec<u32>,
}

impl ColumnStore {
    pub fn new(size_x: u32, size_z: u32, voxels: Vec<ColumnVoxel>, start_index: Vec<u32>) -> Self {
        assert_eq!(
            start_index.len(),
            (size_x as usize) * (size_z as usize) + 1,
            "start_index must hold one entry per column plus a terminator"
        );
        assert_eq!(
            *start_index.last().expect("start_index is non-empty") as usize,
            voxels.len(),
            "start_index terminator must equal the voxel count"
        );

        Self {
            size_x,
            size_z,
            voxels,
            start_index,
        }
    }

    /// Build a store from a surface height map, keeping only the surface
    /// cell and every cell that faces a lower neighbouring surface. With
    /// `floor = min(h - 1, lowest 4-neighbour height)`, column (x, z) of
    /// height h stores y in `[floor + 1, h]`, all with the surface id.
    pub fn from_height_map(size_x: u32, size_z: u32, heights: &[i32], surface_ids: &[u8]) -> Self {
        let columns = (size_x as usize) * (size_z as usize);
        assert_eq!(heights.len(), columns);
        assert_eq!(surface_ids.len(), columns);

        let height_at = |x: i32, z: i32| -> Option<i32> {
            if x < 0 || z < 0 || x >= size_x as i32 || z >= size_z as i32 {
                return None;
            }
            Some(heights[(x as usize) * (size_z as usize) + z as usize])
        };

        let mut voxels = Vec::with_capacity(columns);
        let mut start_index = Vec::with_capacity(columns + 1);
        start_index.push(0);

        for x in 0..size_x as i32 {
            for z in 0..size_z as i32 {
                let h = heights[(x as usize) * (size_z as usize) + z as usize];
                debug_assert!(h >= 0, "surface heights must be non-negative");
                let id = surface_ids[(x as usize) * (size_z as usize) + z as usize];

                let mut floor = h - 1;
                for (nx, nz) in [(x - 1, z), (x + 1, z), (x, z - 1), (x, z + 1)] {
                    let neighbour = height_at(nx, nz).unwrap_or(h - 1);
                    floor = floor.min(neighbour);
                }

                for y in (floor + 1)..=h {
                    voxels.push(ColumnVoxel::new(y, id));
                }
                start_index.push(voxels.len() as u32);
            }
        }

        Self {
            size_x,
            size_z,
            voxels,
            start_index,
        }
    }

    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    pub fn size_z(&self) -> u32 {
        self.size_z
    }

    pub fn voxel_count(&self) -> usize {
        self.voxels.len()
    }

    pub fn voxels(&self) -> &[ColumnVoxel] {
        &self.voxels
    }

    pub fn start_index(&self) -> &[u32] {
        &self.start_index
    }

    pub fn in_bounds(&self, x: i32, z: i32) -> bool {
        x >= 0 && z >= 0 && x < self.size_x as i32 && z < self.size_z as i32
    }

    fn column_index(&self, x: i32, z: i32) -> usize {
        debug_assert!(self.in_bounds(x, z), "column ({x}, {z}) out of range");
        (x as usize) * (self.size_z as usize) + z as usize
    }

    /// The (y, id) cells of column (x, z), ascending in y.
    pub fn column(&self, x: i32, z: i32) -> &[ColumnVoxel] {
        let k = self.column_index(x, z);
        let start = self.start_index[k] as usize;
        let end = self.start_index[k + 1] as usize;
        &self.voxels[start..end]
    }

    /// Id at (x, y, z), or 0 when the cell is empty.
    pub fn get_voxel(&self, x: i32, y: i32, z: i32) -> u8 {
        let column = self.column(x, z);
        match column.binary_search_by_key(&y, |cell| cell.y) {
            Ok(index) => column[index].id,
            Err(_) => 0,
        }
    }

    /// Lowest stored y of column (x, z); `i32::MAX` when empty.
    pub fn min_y(&self, x: i32, z: i32) -> i32 {
        self.column(x, z).first().map_or(i32::MAX, |cell| cell.y)
    }

    /// Highest stored y of column (x, z); `i32::MIN` when empty.
    pub fn max_y(&self, x: i32, z: i32) -> i32 {
        self.column(x, z).last().map_or(i32::MIN, |cell| cell.y)
    }

    /// Checks every invariant meshing relies on: footprint and heights
    /// inside the packed-coordinate range, columns strictly ascending,
    /// no zero ids. Runs before meshing starts; nothing is meshed on error.
    pub fn validate(&self) -> Result<(), TerrainError> {
        if self.size_x == 0 || self.size_z == 0 {
            return Err(TerrainError::Data("footprint must be non-empty".to_string()));
        }
        if self.size_x > MAX_HORIZONTAL_COORD || self.size_z > MAX_HORIZONTAL_COORD {
            return Err(TerrainError::Data(format!(
                "footprint {}x{} exceeds the packed coordinate range",
                self.size_x, self.size_z
            )));
        }

        for x in 0..self.size_x as i32 {
            for z in 0..self.size_z as i32 {
                let column = self.column(x, z);
                let mut previous_y = i32::MIN;
                for cell in column {
                    if cell.id == 0 {
                        return Err(TerrainError::Data(format!(
                            "column ({x}, {z}) stores id 0 at y {}",
                            cell.y
                        )));
                    }
                    if cell.y <= previous_y {
                        return Err(TerrainError::Data(format!(
                            "column ({x}, {z}) is not sorted at y {}",
                            cell.y
                        )));
                    }
                    // +1 headroom: positive-normal faces store y + 1.
                    if cell.y < 0 || cell.y as u32 >= MAX_VERTICAL_COORD {
                        return Err(TerrainError::Data(format!(
                            "column ({x}, {z}) height {} exceeds the packed coordinate range",
                            cell.y
                        )));
                    }
                    previous_y = cell.y;
                }
            }
        }

        Ok(())
    }
}
