use std::env;
use std::path::Path;

use gabbro_core::jobs::JobSystem;
use gabbro_mesher::build_terrain;
use gabbro_persist::read_asset;
use gabbro_shared::config::MeshingConfig;

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("Usage: asset_inspector <path/to/terrain.vox> [--mesh]");
        std::process::exit(2);
    };
    let mesh = args.any(|arg| arg == "--mesh");

    if let Err(err) = run(Path::new(&path), mesh) {
        eprintln!("asset_inspector error: {err}");
        std::process::exit(1);
    }
}

fn run(path: &Path, mesh: bool) -> Result<(), String> {
    let asset = read_asset(path)
        .map_err(|err| format!("failed to open {}: {err}", path.display()))?;
    let columns = &asset.columns;

    println!("Asset: {}", path.display());
    println!(
        "Bounds: center {:?}, size {:?}",
        asset.bounds.center, asset.bounds.size
    );
    println!("Footprint: {}x{}", columns.size_x(), columns.size_z());
    println!("Stored voxels: {}", columns.voxel_count());

    let mut id_counts = [0u64; 256];
    let mut lowest = i32::MAX;
    let mut highest = i32::MIN;
    for voxel in columns.voxels() {
        id_counts[voxel.id as usize] += 1;
        lowest = lowest.min(voxel.y);
        highest = highest.max(voxel.y);
    }
    if lowest <= highest {
        println!("Height range: {lowest}..={highest}");
    }
    for (id, count) in id_counts.iter().enumerate() {
        if *count > 0 {
            println!("  id {id}: {count} voxels");
        }
    }

    if mesh {
        let jobs = JobSystem::new(None).map_err(|err| format!("job pool: {err}"))?;
        let terrain = build_terrain(columns, &MeshingConfig::default(), &jobs)
            .map_err(|err| format!("meshing failed: {err}"))?;
        println!("Meshed: {} quads in {} meshes", terrain.quads.len(), terrain.meshes.len());
        for (index, mesh) in terrain.meshes.iter().enumerate().take(16) {
            println!(
                "  mesh {index}: normal {}, {} faces from {}",
                mesh.normal(),
                mesh.face_count(),
                mesh.start_face()
            );
        }
        if terrain.meshes.len() > 16 {
            println!("  ... {} more", terrain.meshes.len() - 16);
        }
    }

    Ok(())
}
