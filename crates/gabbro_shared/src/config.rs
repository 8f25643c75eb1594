use serde::{Deserialize, Serialize};

use crate::coords::MAX_HORIZONTAL_COORD;
use crate::error::TerrainError;

/// Hard cap on quads per published mesh: the shared 16-bit index buffer
/// holds 6 * 16384 entries, two triangles per quad.
pub const MAX_QUADS_PER_MESH: u32 = 16_384;

/// Threads per workgroup of the culling kernel; the mesh table is padded
/// to a multiple of this.
pub const CULL_WORKGROUP_SIZE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshingConfig {
    /// Horizontal extent of one mesh tile, the unit that becomes one
    /// directional-mesh family. Best as a multiple of 64.
    pub max_horizontal_size: u32,
    /// Tiles whose total face count stays below this collapse their six
    /// directional meshes into a single any-normal mesh.
    pub merge_normals_threshold: u32,
    /// Horizontal extent of one parallel job; `None` meshes the whole
    /// footprint as a single job. Best as a multiple of `max_horizontal_size`.
    pub job_horizontal_size: Option<u32>,
    /// Columns were trimmed by a generator that only keeps cells visible
    /// from above or from the sides; skip faces such a camera cannot see
    /// and treat cells beneath a column's lowest stored voxel as solid.
    pub seen_from_above: bool,
}

impl Default for MeshingConfig {
    fn default() -> Self {
        Self {
            max_horizontal_size: 64,
            merge_normals_threshold: 256,
            job_horizontal_size: None,
            seen_from_above: true,
        }
    }
}

impl MeshingConfig {
    pub fn validate(&self) -> Result<(), TerrainError> {
        if self.max_horizontal_size == 0 {
            return Err(TerrainError::Configuration(
                "max_horizontal_size must be non-zero".to_string(),
            ));
        }
        if self.max_horizontal_size > MAX_HORIZONTAL_COORD + 1
            || self.job_horizontal_size.is_some_and(|size| size > MAX_HORIZONTAL_COORD + 1)
        {
            return Err(TerrainError::Configuration(format!(
                "tile sizes beyond {} columns exceed any legal footprint",
                MAX_HORIZONTAL_COORD + 1
            )));
        }
        if self.merge_normals_threshold > MAX_QUADS_PER_MESH {
            return Err(TerrainError::Configuration(format!(
                "merge_normals_threshold {} exceeds the per-mesh cap {}",
                self.merge_normals_threshold, MAX_QUADS_PER_MESH
            )));
        }
        if self.job_horizontal_size == Some(0) {
            return Err(TerrainError::Configuration(
                "job_horizontal_size must be non-zero when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MeshingConfig, MAX_QUADS_PER_MESH};

    #[test]
    fn default_config_is_valid() {
        MeshingConfig::default()
            .validate()
            .expect("default config must validate");
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        let config = MeshingConfig {
            max_horizontal_size: 0,
            ..MeshingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn threshold_above_cap_is_rejected() {
        let config = MeshingConfig {
            merge_normals_threshold: MAX_QUADS_PER_MESH + 1,
            ..MeshingConfig::default()
        };
        assert!(config.validate().is_err());

        let at_cap = MeshingConfig {
            merge_normals_threshold: MAX_QUADS_PER_MESH,
            ..MeshingConfig::default()
        };
        at_cap.validate().expect("threshold at the cap is allowed");
    }

    #[test]
    fn zero_job_size_is_rejected() {
        let config = MeshingConfig {
            job_horizontal_size: Some(0),
            ..MeshingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
