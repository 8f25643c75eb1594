use glam::{IVec3, Vec3};

use gabbro_shared::config::MAX_QUADS_PER_MESH;
use gabbro_shared::coords::NORMAL_ANY;
use gabbro_shared::error::TerrainError;
use gabbro_shared::quad::PackedQuad;

const NO_PART: i32 = -1;

/// One contiguous run of scratch quads, linked into a mesh under
/// construction. Parts let a mesh grow chunk by chunk without moving quads.
#[derive(Debug, Clone, Copy)]
struct MeshPart {
    start: u32,
    end: u32,
    next: i32,
}

#[derive(Debug, Clone, Copy)]
struct NormalHead {
    first_part: i32,
    face_count: u32,
    min: IVec3,
    max: IVec3,
}

impl NormalHead {
    fn new() -> Self {
        Self {
            first_part: NO_PART,
            face_count: 0,
            min: IVec3::MAX,
            max: IVec3::MIN,
        }
    }
}

/// A finished mesh of one tile, with `start_face` relative to the tile's
/// own quad vector.
#[derive(Debug, Clone, Copy)]
pub struct TileMesh {
    pub center: Vec3,
    pub half_size: Vec3,
    pub normal: u32,
    pub face_count: u32,
    pub start_face: u32,
}

/// Groups the quads of one mesh tile into meshes: one linked-list head per
/// normal, split whenever the per-mesh quad cap would overflow, and the
/// whole tile collapsed into a single any-normal mesh when it stays small.
pub struct TileAssembler {
    merge_threshold: u32,
    scratch: Vec<PackedQuad>,
    parts: Vec<MeshPart>,
    heads: [NormalHead; 6],
    out_quads: Vec<PackedQuad>,
    out_meshes: Vec<TileMesh>,
    overflowed: bool,
}

impl TileAssembler {
    pub fn new(merge_threshold: u32) -> Self {
        Self {
            merge_threshold,
            scratch: Vec::new(),
            parts: Vec::new(),
            heads: [NormalHead::new(); 6],
            out_quads: Vec::new(),
            out_meshes: Vec::new(),
            overflowed: false,
        }
    }

    /// Current scratch length; callers snapshot this before a chunk group
    /// and hand it back to `commit_part`.
    pub fn quad_count(&self) -> u32 {
        self.scratch.len() as u32
    }

    pub fn push_quad(&mut self, quad: PackedQuad) {
        if self.scratch.len() >= u32::MAX as usize {
            self.overflowed = true;
            return;
        }
        let head = &mut self.heads[quad.normal() as usize];
        let (min, max) = quad.voxel_bounds();
        head.min = head.min.min(min);
        head.max = head.max.max(max);
        self.scratch.push(quad);
    }

    /// Attach the scratch range `[start, current)` to `normal`'s mesh under
    /// construction, splitting it across meshes wherever the quad cap fills.
    pub fn commit_part(&mut self, normal: u32, start: u32) {
        let end = self.quad_count();
        let mut start = start;
        if start == end {
            return;
        }

        loop {
            let head = &self.heads[normal as usize];
            let available = MAX_QUADS_PER_MESH - head.face_count;
            let len = end - start;

            if len <= available {
                self.attach(normal, start, end, len);
                return;
            }
            if available > 0 {
                self.attach(normal, start, start + available, available);
                start += available;
            }
            self.close_mesh(normal);
        }
    }

    fn attach(&mut self, normal: u32, start: u32, end: u32, len: u32) {
        let head = &mut self.heads[normal as usize];
        let part = MeshPart {
            start,
            end,
            next: head.first_part,
        };
        head.first_part = self.parts.len() as i32;
        head.face_count += len;
        self.parts.push(part);
    }

    /// Emit the mesh a head currently holds. The bounds are left in place
    /// on purpose: when a cap split spills into a fresh head, both meshes
    /// share the union of everything the group produced.
    fn close_mesh(&mut self, normal: u32) {
        let head = self.heads[normal as usize];
        if head.face_count == 0 {
            return;
        }

        let start_face = self.out_quads.len() as u32;
        let mut part = head.first_part;
        while part != NO_PART {
            let p = self.parts[part as usize];
            self.out_quads
                .extend_from_slice(&self.scratch[p.start as usize..p.end as usize]);
            part = p.next;
        }

        let min = head.min.as_vec3();
        let max = head.max.as_vec3();
        self.out_meshes.push(TileMesh {
            center: (min + max) * 0.5,
            half_size: (max - min) * 0.5,
            normal,
            face_count: head.face_count,
            start_face,
        });

        let head = &mut self.heads[normal as usize];
        head.first_part = NO_PART;
        head.face_count = 0;
    }

    /// Close out the tile: merge the six heads into one any-normal mesh
    /// when the tile stayed below the merge threshold, otherwise emit each
    /// non-empty head as its own directional mesh.
    pub fn finish(mut self) -> Result<(Vec<PackedQuad>, Vec<TileMesh>), TerrainError> {
        if self.overflowed {
            return Err(TerrainError::CapacityExceeded(
                "tile quad counter overflowed before the per-mesh split".to_string(),
            ));
        }

        let total: u32 = self.heads.iter().map(|head| head.face_count).sum();
        if total > 0 && total < self.merge_threshold {
            let start_face = self.out_quads.len() as u32;
            let mut min = IVec3::MAX;
            let mut max = IVec3::MIN;
            for normal in 0..6 {
                let head = self.heads[normal];
                if head.face_count == 0 {
                    continue;
                }
                min = min.min(head.min);
                max = max.max(head.max);
                let mut part = head.first_part;
                while part != NO_PART {
                    let p = self.parts[part as usize];
                    self.out_quads
                        .extend_from_slice(&self.scratch[p.start as usize..p.end as usize]);
                    part = p.next;
                }
            }
            let min = min.as_vec3();
            let max = max.as_vec3();
            self.out_meshes.push(TileMesh {
                center: (min + max) * 0.5,
                half_size: (max - min) * 0.5,
                normal: NORMAL_ANY,
                face_count: total,
                start_face,
            });
        } else {
            for normal in 0..6 {
                self.close_mesh(normal as u32);
            }
        }

        Ok((self.out_quads, self.out_meshes))
    }
}

#[cfg(test)]
mod tests {
    use gabbro_shared::config::MAX_QUADS_PER_MESH;
    use gabbro_shared::coords::NORMAL_ANY;
    use gabbro_shared::quad::PackedQuad;

    use super::TileAssembler;

    fn top_quad(x: u32, z: u32) -> PackedQuad {
        PackedQuad::pack(x, 1, z, 1, 1, 2, 1)
    }

    #[test]
    fn small_tile_collapses_into_one_any_normal_mesh() {
        let mut assembler = TileAssembler::new(256);
        for normal in 0..6u32 {
            let start = assembler.quad_count();
            assembler.push_quad(PackedQuad::pack(1, 1, 1, 1, 1, normal, 1));
            assembler.commit_part(normal, start);
        }

        let (quads, meshes) = assembler.finish().expect("no overflow");
        assert_eq!(quads.len(), 6);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].normal, NORMAL_ANY);
        assert_eq!(meshes[0].face_count, 6);
        assert_eq!(meshes[0].start_face, 0);
    }

    #[test]
    fn large_tile_keeps_directional_meshes() {
        let mut assembler = TileAssembler::new(4);
        for normal in 0..6u32 {
            let start = assembler.quad_count();
            assembler.push_quad(PackedQuad::pack(1, 1, 1, 1, 1, normal, 1));
            assembler.commit_part(normal, start);
        }

        let (quads, meshes) = assembler.finish().expect("no overflow");
        assert_eq!(quads.len(), 6);
        assert_eq!(meshes.len(), 6);
        let mut normals: Vec<u32> = meshes.iter().map(|mesh| mesh.normal).collect();
        normals.sort_unstable();
        assert_eq!(normals, vec![0, 1, 2, 3, 4, 5]);
        for mesh in &meshes {
            assert_eq!(mesh.face_count, 1);
        }
    }

    #[test]
    fn parts_flatten_most_recent_chunk_first() {
        let mut assembler = TileAssembler::new(0);

        let start = assembler.quad_count();
        assembler.push_quad(top_quad(0, 0));
        assembler.commit_part(2, start);

        let start = assembler.quad_count();
        assembler.push_quad(top_quad(1, 0));
        assembler.commit_part(2, start);

        let (quads, meshes) = assembler.finish().expect("no overflow");
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].face_count, 2);
        // The part list is built by prepending, so the second chunk's quad
        // lands first in the flattened table.
        assert_eq!(quads[0].x(), 1);
        assert_eq!(quads[1].x(), 0);
    }

    #[test]
    fn quad_cap_splits_into_two_meshes_sharing_bounds() {
        let mut assembler = TileAssembler::new(0);
        let start = assembler.quad_count();
        for i in 0..(MAX_QUADS_PER_MESH + 1) {
            assembler.push_quad(top_quad(i % 8192, i / 8192));
        }
        assembler.commit_part(2, start);

        let (quads, meshes) = assembler.finish().expect("no overflow");
        assert_eq!(quads.len() as u32, MAX_QUADS_PER_MESH + 1);
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].face_count, MAX_QUADS_PER_MESH);
        assert_eq!(meshes[1].face_count, 1);
        assert_eq!(meshes[0].normal, 2);
        assert_eq!(meshes[1].normal, 2);
        assert_eq!(meshes[0].center, meshes[1].center);
        assert_eq!(meshes[0].half_size, meshes[1].half_size);
        assert_eq!(meshes[1].start_face, MAX_QUADS_PER_MESH);
    }

    #[test]
    fn face_counts_always_sum_to_the_quad_table_length() {
        let mut assembler = TileAssembler::new(8);
        for chunk in 0..3u32 {
            for normal in [2u32, 5u32] {
                let start = assembler.quad_count();
                for i in 0..chunk + 1 {
                    assembler.push_quad(PackedQuad::pack(chunk + 1, 1, i + 1, 1, 1, normal, 1));
                }
                assembler.commit_part(normal, start);
            }
        }

        let (quads, meshes) = assembler.finish().expect("no overflow");
        let total: u32 = meshes.iter().map(|mesh| mesh.face_count).sum();
        assert_eq!(total as usize, quads.len());
    }
}
