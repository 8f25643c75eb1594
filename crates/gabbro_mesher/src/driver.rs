use std::time::Instant;

fn div_ceil_i32(a: i32, b: i32) -> i32 {
    (a as u32).div_ceil(b as u32) as i32
}

use glam::IVec3;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use gabbro_core::events;
use gabbro_core::jobs::JobSystem;
use gabbro_shared::columns::ColumnStore;
use gabbro_shared::config::MeshingConfig;
use gabbro_shared::coords::{normal_axis, normal_is_negative, CHUNK_SIZE_I32};
use gabbro_shared::error::TerrainError;
use gabbro_shared::mesh::PackedMesh;
use gabbro_shared::quad::PackedQuad;

use crate::assembler::{TileAssembler, TileMesh};
use crate::bitset::ChunkBitset;
use crate::greedy::pack_plane;
use crate::merger::{IdentityMerger, MergeStrategy};
use crate::planes::{extract_chunk, plane_to_world, FacePlanes, IdTable};

/// The flattened output of one meshing run: the global quad table and the
/// mesh records pointing into it. Immutable once built.
#[derive(Debug, Default)]
pub struct MeshedTerrain {
    pub quads: Vec<PackedQuad>,
    pub meshes: Vec<PackedMesh>,
}

type JobResult = Result<(Vec<PackedQuad>, Vec<TileMesh>), TerrainError>;

pub fn build_terrain(
    store: &ColumnStore,
    config: &MeshingConfig,
    jobs: &JobSystem,
) -> Result<MeshedTerrain, TerrainError> {
    build_terrain_with(store, config, jobs, &IdentityMerger)
}

/// Mesh the whole store: one parallel job per job tile, one directional
/// mesh family per mesh tile, chunks of 64^3 inside. Nothing is shared
/// between jobs but the read-only store; the single-threaded flatten at
/// the end is the only writer of the global tables.
pub fn build_terrain_with<M: MergeStrategy>(
    store: &ColumnStore,
    config: &MeshingConfig,
    jobs: &JobSystem,
    merger: &M,
) -> Result<MeshedTerrain, TerrainError> {
    config.validate()?;
    store.validate()?;
    let started = Instant::now();

    let size_x = store.size_x() as i32;
    let size_z = store.size_z() as i32;
    let tile = config.max_horizontal_size as i32;
    let tiles_x = div_ceil_i32(size_x, tile);
    let tiles_z = div_ceil_i32(size_z, tile);
    let job_size = config
        .job_horizontal_size
        .map(|size| size as i32)
        .unwrap_or_else(|| size_x.max(size_z).max(tile));

    // Mesh tiles are assigned to the job holding their origin column.
    let mut groups: FxHashMap<(i32, i32), Vec<(i32, i32)>> = FxHashMap::default();
    for tx in 0..tiles_x {
        for tz in 0..tiles_z {
            let key = (tx * tile / job_size, tz * tile / job_size);
            groups.entry(key).or_default().push((tx, tz));
        }
    }
    let mut keys: Vec<(i32, i32)> = groups.keys().copied().collect();
    keys.sort_unstable();
    let job_tiles: Vec<Vec<(i32, i32)>> = keys
        .iter()
        .map(|key| groups.remove(key).expect("job group exists"))
        .collect();

    let (sender, receiver) = events::channel();
    jobs.scope(|scope| {
        for (job_index, tiles) in job_tiles.iter().enumerate() {
            let sender = sender.clone();
            scope.spawn(move |_| {
                let result = mesh_job(store, config, merger, tiles);
                let _ = sender.send((job_index, result));
            });
        }
    });
    drop(sender);

    let mut outputs: FxHashMap<usize, JobResult> = FxHashMap::default();
    for (job_index, result) in receiver.drain() {
        outputs.insert(job_index, result);
    }

    let mut terrain = MeshedTerrain::default();
    for job_index in 0..job_tiles.len() {
        let result = outputs
            .remove(&job_index)
            .expect("every meshing job reports a result");
        let (job_quads, job_meshes) = result?;

        if terrain.quads.len() + job_quads.len() > u32::MAX as usize {
            return Err(TerrainError::CapacityExceeded(
                "global quad table exceeds the 32-bit face index range".to_string(),
            ));
        }
        let base = terrain.quads.len() as u32;
        terrain.quads.extend_from_slice(&job_quads);
        for mesh in job_meshes {
            terrain.meshes.push(PackedMesh::pack(
                mesh.center,
                mesh.half_size,
                mesh.normal,
                mesh.face_count,
                base + mesh.start_face,
            ));
        }
    }

    info!(
        "meshed {} columns into {} quads across {} meshes in {:.1?}",
        store.size_x() as u64 * store.size_z() as u64,
        terrain.quads.len(),
        terrain.meshes.len(),
        started.elapsed()
    );
    Ok(terrain)
}

fn mesh_job<M: MergeStrategy>(
    store: &ColumnStore,
    config: &MeshingConfig,
    merger: &M,
    tiles: &[(i32, i32)],
) -> JobResult {
    let size_x = store.size_x() as i32;
    let size_z = store.size_z() as i32;
    let tile = config.max_horizontal_size as i32;

    // Dense id table over the whole job; tiles grouped into one job form a
    // contiguous rectangle of columns.
    let tx0 = tiles.iter().map(|&(tx, _)| tx).min().expect("job has tiles");
    let tx1 = tiles.iter().map(|&(tx, _)| tx).max().expect("job has tiles");
    let tz0 = tiles.iter().map(|&(_, tz)| tz).min().expect("job has tiles");
    let tz1 = tiles.iter().map(|&(_, tz)| tz).max().expect("job has tiles");
    let ids = IdTable::build(
        store,
        merger,
        (tx0 * tile)..((tx1 + 1) * tile).min(size_x),
        (tz0 * tile)..((tz1 + 1) * tile).min(size_z),
    );
    if ids.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    // Scratch lives for the whole job and is reused chunk to chunk.
    let mut bits = ChunkBitset::new();
    let mut planes = FacePlanes::new(ids.len());

    let mut quads = Vec::new();
    let mut meshes = Vec::new();

    for &(tx, tz) in tiles {
        let x0 = tx * tile;
        let x1 = (x0 + tile).min(size_x);
        let z0 = tz * tile;
        let z1 = (z0 + tile).min(size_z);

        let mut assembler = TileAssembler::new(config.merge_normals_threshold);
        let mut chunk_x = x0;
        while chunk_x < x1 {
            let mut chunk_z = z0;
            while chunk_z < z1 {
                mesh_chunk_stack(
                    store,
                    config,
                    merger,
                    &ids,
                    &mut bits,
                    &mut planes,
                    &mut assembler,
                    chunk_x,
                    chunk_z,
                );
                chunk_z += CHUNK_SIZE_I32;
            }
            chunk_x += CHUNK_SIZE_I32;
        }

        let (tile_quads, tile_meshes) = assembler.finish()?;
        debug!(
            "tile ({tx}, {tz}): {} quads in {} meshes",
            tile_quads.len(),
            tile_meshes.len()
        );

        let base = quads.len() as u32;
        quads.extend_from_slice(&tile_quads);
        meshes.extend(tile_meshes.into_iter().map(|mesh| TileMesh {
            start_face: base + mesh.start_face,
            ..mesh
        }));
    }

    Ok((quads, meshes))
}

/// Mesh every 64-high chunk of one 64x64 footprint, bottom to top. The y
/// range is clamped to what the footprint's columns actually hold.
#[allow(clippy::too_many_arguments)]
fn mesh_chunk_stack<M: MergeStrategy>(
    store: &ColumnStore,
    config: &MeshingConfig,
    merger: &M,
    ids: &IdTable,
    bits: &mut ChunkBitset,
    planes: &mut FacePlanes,
    assembler: &mut TileAssembler,
    chunk_x: i32,
    chunk_z: i32,
) {
    let x_end = (chunk_x + CHUNK_SIZE_I32).min(store.size_x() as i32);
    let z_end = (chunk_z + CHUNK_SIZE_I32).min(store.size_z() as i32);

    let mut y_min = i32::MAX;
    let mut y_max = i32::MIN;
    for x in chunk_x..x_end {
        for z in chunk_z..z_end {
            let column = store.column(x, z);
            if let (Some(first), Some(last)) = (column.first(), column.last()) {
                y_min = y_min.min(first.y);
                y_max = y_max.max(last.y);
            }
        }
    }
    if y_min > y_max {
        return;
    }

    let chunk_count = div_ceil_i32(y_max - y_min + 1, CHUNK_SIZE_I32);
    for layer in 0..chunk_count {
        let base = IVec3::new(chunk_x, y_min + layer * CHUNK_SIZE_I32, chunk_z);
        bits.clear();
        bits.fill(store, base, config.seen_from_above);
        extract_chunk(planes, bits, store, ids, merger, base, config.seen_from_above);

        for normal in 0..6u32 {
            let start = assembler.quad_count();
            pack_chunk_normal(planes, ids, assembler, base, normal);
            assembler.commit_part(normal, start);
        }
    }
}

/// Run the greedy packer over every (id, depth) plane of one normal and
/// feed the rectangles to the assembler as packed quads.
fn pack_chunk_normal(
    planes: &mut FacePlanes,
    ids: &IdTable,
    assembler: &mut TileAssembler,
    base: IVec3,
    normal: u32,
) {
    let axis = normal_axis(normal);
    let positive = !normal_is_negative(normal);

    for id_index in 0..ids.len() {
        let mut occupancy = planes.take_occupancy(normal, id_index);
        if occupancy == 0 {
            continue;
        }
        let color = ids.id_at(id_index);

        while occupancy != 0 {
            let depth = occupancy.trailing_zeros() as usize;
            occupancy &= occupancy - 1;

            let plane = planes.plane_mut(normal, id_index, depth);
            pack_plane(plane, |x, y, width, height| {
                let mut pos = plane_to_world(base, axis, depth as i32, x as i32, y as i32);
                if positive {
                    // The quad lies on the far boundary of its voxel.
                    match axis {
                        0 => pos.x += 1,
                        1 => pos.z += 1,
                        _ => pos.y += 1,
                    }
                }
                assembler.push_quad(PackedQuad::pack(
                    pos.x as u32,
                    pos.y as u32,
                    pos.z as u32,
                    width,
                    height,
                    normal,
                    color,
                ));
            });
        }
    }
}
