use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::coords::NORMAL_NONE;

const NORMAL_MASK: u32 = 7;
const FACE_COUNT_SHIFT: u32 = 3;
pub const MAX_PACKED_FACE_COUNT: u32 = (1 << 29) - 1;

/// One draw unit, packed to 32 bytes for the GPU mesh table. `center` and
/// `size` are the bounding box (half-extents) of every voxel the mesh's
/// quads cover, in world units of one voxel. The quads occupy
/// `[start_face, start_face + face_count)` in the global quad table.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PackedMesh {
    pub center: [f32; 3],
    pub data1: u32,
    pub size: [f32; 3],
    pub data2: u32,
}

const _: [(); 32] = [(); std::mem::size_of::<PackedMesh>()];

impl PackedMesh {
    pub fn pack(center: Vec3, size: Vec3, normal: u32, face_count: u32, start_face: u32) -> Self {
        debug_assert!(normal <= NORMAL_NONE);
        debug_assert!(face_count <= MAX_PACKED_FACE_COUNT);

        Self {
            center: center.to_array(),
            data1: normal | (face_count << FACE_COUNT_SHIFT),
            size: size.to_array(),
            data2: start_face,
        }
    }

    /// Padding sentinel: never culled in, never drawn.
    pub fn none() -> Self {
        Self {
            center: [0.0; 3],
            data1: NORMAL_NONE,
            size: [0.0; 3],
            data2: 0,
        }
    }

    pub fn center(&self) -> Vec3 {
        Vec3::from(self.center)
    }

    pub fn half_size(&self) -> Vec3 {
        Vec3::from(self.size)
    }

    pub fn normal(&self) -> u32 {
        self.data1 & NORMAL_MASK
    }

    pub fn face_count(&self) -> u32 {
        self.data1 >> FACE_COUNT_SHIFT
    }

    pub fn start_face(&self) -> u32 {
        self.data2
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{PackedMesh, MAX_PACKED_FACE_COUNT};
    use crate::coords::NORMAL_NONE;

    #[test]
    fn pack_round_trips_every_field() {
        let cases = [
            (Vec3::ZERO, Vec3::ONE, 0, 1, 0),
            (
                Vec3::new(1024.5, 63.0, -8.0),
                Vec3::new(32.0, 2.5, 32.0),
                6,
                16_384,
                u32::MAX,
            ),
            (Vec3::splat(7.25), Vec3::splat(0.5), 5, MAX_PACKED_FACE_COUNT, 12),
        ];

        for (center, size, normal, face_count, start_face) in cases {
            let mesh = PackedMesh::pack(center, size, normal, face_count, start_face);
            assert_eq!(mesh.center(), center);
            assert_eq!(mesh.half_size(), size);
            assert_eq!(mesh.normal(), normal);
            assert_eq!(mesh.face_count(), face_count);
            assert_eq!(mesh.start_face(), start_face);
        }
    }

    #[test]
    fn none_sentinel_is_empty_and_unrenderable() {
        let padding = PackedMesh::none();
        assert_eq!(padding.normal(), NORMAL_NONE);
        assert_eq!(padding.face_count(), 0);
        assert_eq!(padding.half_size(), Vec3::ZERO);
    }
}
