use std::env;
use std::path::PathBuf;

use glam::Vec3;
use noise::{NoiseFn, Perlin};
use tracing::info;

use gabbro_persist::write_asset;
use gabbro_shared::columns::ColumnStore;
use gabbro_shared::coords::WorldBounds;

const MAX_SURFACE_HEIGHT: f64 = 120.0;

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut size: u32 = 512;
    let mut seed: u32 = 7;
    let mut out = PathBuf::from("terrain.vox");

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--size" => {
                let Some(value) = args.next() else {
                    eprintln!("--size expects a number of columns per side");
                    std::process::exit(2);
                };
                match value.parse::<u32>() {
                    Ok(parsed) if parsed > 0 && parsed <= 8191 => size = parsed,
                    _ => {
                        eprintln!("invalid size '{value}': expected 1..=8191");
                        std::process::exit(2);
                    }
                }
            }
            "--seed" => {
                let Some(value) = args.next() else {
                    eprintln!("--seed expects a number");
                    std::process::exit(2);
                };
                match value.parse::<u32>() {
                    Ok(parsed) => seed = parsed,
                    Err(err) => {
                        eprintln!("invalid seed '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--out" => {
                let Some(value) = args.next() else {
                    eprintln!("--out expects a path");
                    std::process::exit(2);
                };
                out = PathBuf::from(value);
            }
            other => {
                eprintln!("unknown argument '{other}'");
                eprintln!("Usage: terrain_baker [--size N] [--seed N] [--out path]");
                std::process::exit(2);
            }
        }
    }

    let (heights, ids) = bake_height_map(size, seed);
    let columns = ColumnStore::from_height_map(size, size, &heights, &ids);

    let top = heights.iter().copied().max().unwrap_or(0);
    let extent = Vec3::new(size as f32, (top + 1) as f32, size as f32);
    let bounds = WorldBounds::from_min_max(Vec3::ZERO, extent);

    info!(
        "baked {size}x{size} columns ({} voxels, peak height {top})",
        columns.voxel_count()
    );
    if let Err(err) = write_asset(&out, &bounds, &columns) {
        eprintln!("failed to write {}: {err}", out.display());
        std::process::exit(1);
    }
    info!("wrote {}", out.display());
}

/// Two octaves of Perlin for the relief, one more for the material bands.
fn bake_height_map(size: u32, seed: u32) -> (Vec<i32>, Vec<u8>) {
    let relief = Perlin::new(seed);
    let detail = Perlin::new(seed.wrapping_add(1));
    let material = Perlin::new(seed.wrapping_add(2));

    let columns = (size as usize) * (size as usize);
    let mut heights = Vec::with_capacity(columns);
    let mut ids = Vec::with_capacity(columns);

    for x in 0..size {
        for z in 0..size {
            let wx = f64::from(x);
            let wz = f64::from(z);
            let rolling = relief.get([wx * 0.004, wz * 0.004]);
            let rough = detail.get([wx * 0.02, wz * 0.02]) * 0.25;
            let normalized = ((rolling + rough) * 0.5 + 0.5).clamp(0.0, 1.0);
            let height = (normalized.powf(1.4) * MAX_SURFACE_HEIGHT) as i32;
            heights.push(height);

            let band = material.get([wx * 0.01, wz * 0.01]);
            let id = if height > 90 {
                4 // peak stone
            } else if height > 60 {
                3 // highland
            } else if band > 0.2 {
                2 // dry ground
            } else {
                1 // plains
            };
            ids.push(id);
        }
    }

    (heights, ids)
}
