use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use gabbro_shared::columns::{ColumnStore, ColumnVoxel};
use gabbro_shared::coords::WorldBounds;

// Sequential little-endian layout:
//   bounds center.xyz, size.xyz   6 x f32
//   size_x, size_z, n_voxels      3 x i32
//   voxel entries                 n_voxels x (y: i32, id: u8, pad: 3)
//   start_index prefix            (size_x * size_z + 1) x i32
const VOXEL_STRIDE: usize = 8;

#[derive(Debug)]
pub struct VoxelAsset {
    pub bounds: WorldBounds,
    pub columns: ColumnStore,
}

pub fn encode_asset(bounds: &WorldBounds, columns: &ColumnStore) -> Vec<u8> {
    let voxels = columns.voxels();
    let start_index = columns.start_index();
    let mut bytes = Vec::with_capacity(36 + voxels.len() * VOXEL_STRIDE + start_index.len() * 4);

    for value in bounds.center.iter().chain(bounds.size.iter()) {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend_from_slice(&(columns.size_x() as i32).to_le_bytes());
    bytes.extend_from_slice(&(columns.size_z() as i32).to_le_bytes());
    bytes.extend_from_slice(&(voxels.len() as i32).to_le_bytes());

    for voxel in voxels {
        bytes.extend_from_slice(&voxel.y.to_le_bytes());
        bytes.push(voxel.id);
        bytes.extend_from_slice(&[0; 3]);
    }

    for entry in start_index {
        bytes.extend_from_slice(&(*entry as i32).to_le_bytes());
    }

    bytes
}

pub fn decode_asset(bytes: &[u8]) -> io::Result<VoxelAsset> {
    let mut cursor = bytes;

    let mut bounds = WorldBounds::default();
    for value in bounds
        .center
        .iter_mut()
        .chain(bounds.size.iter_mut())
    {
        *value = f32::from_le_bytes(take::<4>(&mut cursor, "bounds")?);
    }

    let size_x = i32::from_le_bytes(take::<4>(&mut cursor, "size_x")?);
    let size_z = i32::from_le_bytes(take::<4>(&mut cursor, "size_z")?);
    let n_voxels = i32::from_le_bytes(take::<4>(&mut cursor, "voxel count")?);
    if size_x <= 0 || size_z <= 0 {
        return Err(invalid(format!(
            "footprint {size_x}x{size_z} must be positive"
        )));
    }
    if n_voxels < 0 {
        return Err(invalid(format!("voxel count {n_voxels} must be non-negative")));
    }
    if cursor.len() < n_voxels as usize * VOXEL_STRIDE {
        return Err(invalid(format!(
            "asset holds {} bytes for {n_voxels} voxel entries",
            cursor.len()
        )));
    }

    let mut voxels = Vec::with_capacity(n_voxels as usize);
    for _ in 0..n_voxels {
        let y = i32::from_le_bytes(take::<4>(&mut cursor, "voxel entry")?);
        let entry = take::<4>(&mut cursor, "voxel entry")?;
        voxels.push(ColumnVoxel::new(y, entry[0]));
    }

    let columns = (size_x as usize) * (size_z as usize);
    let mut start_index = Vec::with_capacity(columns + 1);
    let mut previous = 0i32;
    for _ in 0..=columns {
        let entry = i32::from_le_bytes(take::<4>(&mut cursor, "start index")?);
        if entry < previous {
            return Err(invalid(format!(
                "start index {entry} decreases after {previous}"
            )));
        }
        previous = entry;
        start_index.push(entry as u32);
    }
    if previous != n_voxels {
        return Err(invalid(format!(
            "start index ends at {previous}; expected the voxel count {n_voxels}"
        )));
    }

    Ok(VoxelAsset {
        bounds,
        columns: ColumnStore::new(size_x as u32, size_z as u32, voxels, start_index),
    })
}

pub fn write_asset(path: impl AsRef<Path>, bounds: &WorldBounds, columns: &ColumnStore) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = encode_asset(bounds, columns);
    debug!("writing voxel asset {:?} ({} bytes)", path, bytes.len());
    fs::write(path, bytes)
}

pub fn read_asset(path: impl AsRef<Path>) -> io::Result<VoxelAsset> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let asset = decode_asset(&bytes)?;
    debug!(
        "loaded voxel asset {:?}: {}x{} columns, {} voxels",
        path,
        asset.columns.size_x(),
        asset.columns.size_z(),
        asset.columns.voxel_count()
    );
    Ok(asset)
}

fn take<const N: usize>(cursor: &mut &[u8], what: &str) -> io::Result<[u8; N]> {
    if cursor.len() < N {
        return Err(invalid(format!("asset truncated while reading {what}")));
    }
    let (head, tail) = cursor.split_at(N);
    *cursor = tail;
    Ok(head.try_into().expect("split_at returned N bytes"))
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

#[cfg(test)]
mod tests {
    use gabbro_shared::columns::{ColumnStore, ColumnVoxel};
    use gabbro_shared::coords::WorldBounds;

    use super::{decode_asset, encode_asset};

    fn sample_store() -> ColumnStore {
        ColumnStore::new(
            2,
            2,
            vec![
                ColumnVoxel::new(0, 1),
                ColumnVoxel::new(1, 1),
                ColumnVoxel::new(0, 2),
                ColumnVoxel::new(5, 9),
            ],
            vec![0, 2, 3, 3, 4],
        )
    }

    #[test]
    fn encode_decode_round_trips_the_store() {
        let bounds = WorldBounds {
            center: [1.0, 2.0, 3.0],
            size: [2.0, 6.0, 2.0],
        };
        let store = sample_store();
        let bytes = encode_asset(&bounds, &store);

        // Header is 36 bytes, entries are 8-byte strided, prefix is 4 each.
        assert_eq!(bytes.len(), 36 + 4 * 8 + 5 * 4);

        let asset = decode_asset(&bytes).expect("asset decodes");
        assert_eq!(asset.bounds, bounds);
        assert_eq!(asset.columns.size_x(), 2);
        assert_eq!(asset.columns.size_z(), 2);
        assert_eq!(asset.columns.voxels(), store.voxels());
        assert_eq!(asset.columns.start_index(), store.start_index());
        assert_eq!(asset.columns.get_voxel(1, 5, 1), 9);
    }

    #[test]
    fn truncated_assets_are_rejected() {
        let bounds = WorldBounds::default();
        let store = sample_store();
        let bytes = encode_asset(&bounds, &store);

        for cut in [0, 10, 36, bytes.len() - 1] {
            let err = decode_asset(&bytes[..cut]).expect_err("truncation must fail");
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        }
    }

    #[test]
    fn decreasing_start_index_is_rejected() {
        let bounds = WorldBounds::default();
        let store = sample_store();
        let mut bytes = encode_asset(&bounds, &store);

        // Corrupt the second prefix entry (after header + 4 voxel entries).
        let prefix_offset = 36 + 4 * 8 + 4;
        bytes[prefix_offset..prefix_offset + 4].copy_from_slice(&100i32.to_le_bytes());
        let err = decode_asset(&bytes).expect_err("bad prefix must fail");
        assert!(err.to_string().contains("start index"));
    }
}
