use std::sync::atomic::{AtomicBool, Ordering};

use wgpu::util::DeviceExt;

use gabbro_shared::config::MAX_QUADS_PER_MESH;
use gabbro_shared::error::TerrainError;

use crate::pipeline::{CullPipeline, QuadPipeline};

static CONTEXT_CREATED: AtomicBool = AtomicBool::new(false);

/// Process-wide GPU state shared by every published terrain: the quad
/// index buffer, the visible counter and its readback twin, and the cull
/// and draw pipelines. Created once at startup; a second initialisation
/// is refused.
pub struct TerrainContext {
    pub(crate) cull: CullPipeline,
    pub(crate) quads: QuadPipeline,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) counter_buffer: wgpu::Buffer,
    pub(crate) readback_buffer: wgpu::Buffer,
    pub(crate) supports_multi_draw: bool,
    pub(crate) supports_indirect_count: bool,
    destroyed: bool,
}

impl TerrainContext {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Result<Self, TerrainError> {
        if CONTEXT_CREATED.swap(true, Ordering::SeqCst) {
            return Err(TerrainError::State(
                "terrain context is already initialised".to_string(),
            ));
        }

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Quad Index Buffer"),
            contents: bytemuck::cast_slice(&quad_indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        let counter_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Visible Counter"),
            contents: bytemuck::bytes_of(&0u32),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::INDIRECT,
        });

        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Visible Counter Readback"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let features = device.features();
        Ok(Self {
            cull: CullPipeline::new(device),
            quads: QuadPipeline::new(device, color_format, depth_format),
            index_buffer,
            counter_buffer,
            readback_buffer,
            supports_multi_draw: features.contains(wgpu::Features::MULTI_DRAW_INDIRECT),
            supports_indirect_count: features.contains(wgpu::Features::MULTI_DRAW_INDIRECT_COUNT),
            destroyed: false,
        })
    }

    /// Release the GPU buffers. Idempotent; must not run while a frame
    /// using them is still in flight.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.index_buffer.destroy();
        self.counter_buffer.destroy();
        self.readback_buffer.destroy();
        self.destroyed = true;
    }
}

/// The shared quad index pattern: two triangles per quad over four virtual
/// vertices, `(0, 1, 2, 2, 1, 3, 4, 5, 6, 6, 5, 7, ...)`, sized for the
/// largest mesh the cap permits.
fn quad_indices() -> Vec<u16> {
    let mut indices = Vec::with_capacity(MAX_QUADS_PER_MESH as usize * 6);
    for quad in 0..MAX_QUADS_PER_MESH {
        let base = (quad * 4) as u16;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    indices
}

#[cfg(test)]
mod tests {
    use gabbro_shared::config::MAX_QUADS_PER_MESH;

    use super::quad_indices;

    #[test]
    fn index_pattern_marches_four_vertices_per_quad() {
        let indices = quad_indices();
        assert_eq!(indices.len(), MAX_QUADS_PER_MESH as usize * 6);
        assert_eq!(&indices[..12], &[0, 1, 2, 2, 1, 3, 4, 5, 6, 6, 5, 7]);

        // The final quad tops out exactly at the 16-bit limit.
        assert_eq!(*indices.last().expect("indices are non-empty"), u16::MAX);
    }
}
