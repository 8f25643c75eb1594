use bytemuck::{Pod, Zeroable};
use glam::IVec3;

use crate::coords::{
    normal_axis, normal_is_negative, AXIS_X, AXIS_Y, AXIS_Z, HEIGHT_AXIS, WIDTH_AXIS,
};

// data0: x:13 | z:13, data1: y:9 | width-1:6 | height-1:6 | normal:3 | color:8.
const COORD_XZ_BITS: u32 = 13;
const COORD_XZ_MASK: u32 = (1 << COORD_XZ_BITS) - 1;
const COORD_Y_BITS: u32 = 9;
const COORD_Y_MASK: u32 = (1 << COORD_Y_BITS) - 1;
const SPAN_BITS: u32 = 6;
const SPAN_MASK: u32 = (1 << SPAN_BITS) - 1;
const NORMAL_SHIFT: u32 = COORD_Y_BITS + 2 * SPAN_BITS;
const COLOR_SHIFT: u32 = NORMAL_SHIFT + 3;

/// One visible rectangle on the terrain surface, packed to 8 bytes. The
/// stored position is the corner of the rectangle's minimum voxel, with the
/// coordinate along the normal axis already shifted +1 for positive normals
/// so the quad lies on the voxel boundary.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PackedQuad {
    pub data0: u32,
    pub data1: u32,
}

const _: [(); 8] = [(); std::mem::size_of::<PackedQuad>()];

impl PackedQuad {
    pub fn pack(x: u32, y: u32, z: u32, width: u32, height: u32, normal: u32, color: u8) -> Self {
        debug_assert!(x <= COORD_XZ_MASK && z <= COORD_XZ_MASK);
        debug_assert!(y <= COORD_Y_MASK);
        debug_assert!((1..=64).contains(&width) && (1..=64).contains(&height));
        debug_assert!(normal <= 7);

        Self {
            data0: x | (z << COORD_XZ_BITS),
            data1: y
                | ((width - 1) << COORD_Y_BITS)
                | ((height - 1) << (COORD_Y_BITS + SPAN_BITS))
                | (normal << NORMAL_SHIFT)
                | (u32::from(color) << COLOR_SHIFT),
        }
    }

    pub fn x(&self) -> u32 {
        self.data0 & COORD_XZ_MASK
    }

    pub fn z(&self) -> u32 {
        (self.data0 >> COORD_XZ_BITS) & COORD_XZ_MASK
    }

    pub fn y(&self) -> u32 {
        self.data1 & COORD_Y_MASK
    }

    pub fn width(&self) -> u32 {
        ((self.data1 >> COORD_Y_BITS) & SPAN_MASK) + 1
    }

    pub fn height(&self) -> u32 {
        ((self.data1 >> (COORD_Y_BITS + SPAN_BITS)) & SPAN_MASK) + 1
    }

    pub fn normal(&self) -> u32 {
        (self.data1 >> NORMAL_SHIFT) & 7
    }

    pub fn color(&self) -> u8 {
        (self.data1 >> COLOR_SHIFT) as u8
    }

    /// The box of voxel cells this quad covers, one unit deep behind the
    /// face plane. Used for mesh bounds accounting.
    pub fn voxel_bounds(&self) -> (IVec3, IVec3) {
        let normal = self.normal();
        let axis = normal_axis(normal);
        let width_axis = WIDTH_AXIS[axis];
        let height_axis = HEIGHT_AXIS[axis];

        let stored = [self.x() as i32, self.z() as i32, self.y() as i32];
        let mut min = stored;
        let mut max = stored;
        if normal_is_negative(normal) {
            max[axis] += 1;
        } else {
            min[axis] -= 1;
        }
        max[width_axis] += self.width() as i32;
        max[height_axis] += self.height() as i32;

        // `min`/`max` are in sweep-axis order (x, z, y).
        (
            IVec3::new(min[AXIS_X], min[AXIS_Y], min[AXIS_Z]),
            IVec3::new(max[AXIS_X], max[AXIS_Y], max[AXIS_Z]),
        )
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use super::PackedQuad;

    #[test]
    fn pack_round_trips_every_field() {
        let cases = [
            (0, 0, 0, 1, 1, 0, 1u8),
            (8191, 511, 8191, 64, 64, 7, 255),
            (4096, 256, 17, 33, 2, 5, 0),
            (1, 3, 8190, 64, 1, 2, 42),
            (123, 456, 789, 7, 13, 6, 9),
        ];

        for (x, y, z, width, height, normal, color) in cases {
            let quad = PackedQuad::pack(x, y, z, width, height, normal, color);
            assert_eq!(quad.x(), x);
            assert_eq!(quad.y(), y);
            assert_eq!(quad.z(), z);
            assert_eq!(quad.width(), width);
            assert_eq!(quad.height(), height);
            assert_eq!(quad.normal(), normal);
            assert_eq!(quad.color(), color);
        }
    }

    #[test]
    fn positive_x_face_of_origin_voxel_packs_shifted() {
        // A unit voxel at the origin: its +x face lies on the x = 1 plane.
        let quad = PackedQuad::pack(1, 0, 0, 1, 1, 0, 1);
        assert_eq!(quad.x(), 1);
        assert_eq!(quad.y(), 0);
        assert_eq!(quad.z(), 0);
        assert_eq!(quad.width(), 1);
        assert_eq!(quad.height(), 1);
        assert_eq!(quad.normal(), 0);
        assert_eq!(quad.color(), 1);
    }

    #[test]
    fn voxel_bounds_cover_the_cells_behind_the_face() {
        // +x face at x = 1 covers the voxel spanning [0, 1].
        let pos_x = PackedQuad::pack(1, 0, 0, 1, 1, 0, 1);
        assert_eq!(pos_x.voxel_bounds(), (IVec3::ZERO, IVec3::new(1, 1, 1)));

        // -x face at x = 0 covers the same voxel.
        let neg_x = PackedQuad::pack(0, 0, 0, 1, 1, 3, 1);
        assert_eq!(neg_x.voxel_bounds(), (IVec3::ZERO, IVec3::new(1, 1, 1)));

        // A 4x2 top face at y = 3: width runs along x, height along z.
        let top = PackedQuad::pack(5, 3, 7, 4, 2, 2, 1);
        assert_eq!(
            top.voxel_bounds(),
            (IVec3::new(5, 2, 7), IVec3::new(9, 3, 9))
        );
    }
}
