pub mod asset;

pub use asset::{decode_asset, encode_asset, read_asset, write_asset, VoxelAsset};
