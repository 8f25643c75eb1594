use glam::Vec3;
use serde::{Deserialize, Serialize};

pub const CHUNK_SIZE: usize = 64;
pub const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;

/// Largest x/z a packed quad can store (13 bits).
pub const MAX_HORIZONTAL_COORD: u32 = (1 << 13) - 1;
/// Largest y a packed quad can store (9 bits).
pub const MAX_VERTICAL_COORD: u32 = (1 << 9) - 1;

// Sweep axes are numbered x = 0, z = 1, y = 2. A face plane sweeps along
// its axis; the two remaining axes carry the rectangle's width and height.
pub const AXIS_X: usize = 0;
pub const AXIS_Z: usize = 1;
pub const AXIS_Y: usize = 2;

/// Width axis per sweep axis: x sweeps pair with z, z and y with x.
pub const WIDTH_AXIS: [usize; 3] = [AXIS_Z, AXIS_X, AXIS_X];
/// Height axis per sweep axis: horizontal sweeps rise in y, y sweeps in z.
pub const HEIGHT_AXIS: [usize; 3] = [AXIS_Y, AXIS_Y, AXIS_Z];

pub const NORMAL_ANY: u32 = 6;
pub const NORMAL_NONE: u32 = 7;

pub fn normal_index(axis: usize, negative: bool) -> u32 {
    axis as u32 + if negative { 3 } else { 0 }
}

pub fn normal_axis(normal: u32) -> usize {
    (normal % 3) as usize
}

pub fn normal_is_negative(normal: u32) -> bool {
    normal >= 3
}

pub fn axis_unit(axis: usize) -> Vec3 {
    match axis {
        AXIS_X => Vec3::X,
        AXIS_Z => Vec3::Z,
        _ => Vec3::Y,
    }
}

pub fn normal_unit(normal: u32) -> Vec3 {
    let unit = axis_unit(normal_axis(normal));
    if normal_is_negative(normal) {
        -unit
    } else {
        unit
    }
}

/// Axis-aligned world box as center + full extents, the shape handed to
/// scene management at publish and stored in voxel assets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldBounds {
    pub center: [f32; 3],
    pub size: [f32; 3],
}

impl WorldBounds {
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: ((min + max) * 0.5).to_array(),
            size: (max - min).to_array(),
        }
    }

    pub fn min(&self) -> Vec3 {
        Vec3::from(self.center) - Vec3::from(self.size) * 0.5
    }

    pub fn max(&self) -> Vec3 {
        Vec3::from(self.center) + Vec3::from(self.size) * 0.5
    }
}
