use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tracing::{info, warn};
use wgpu::util::DeviceExt;

use gabbro_core::jobs::JobSystem;
use gabbro_mesher::{build_terrain, MeshedTerrain};
use gabbro_shared::columns::ColumnStore;
use gabbro_shared::config::{MeshingConfig, CULL_WORKGROUP_SIZE};
use gabbro_shared::coords::WorldBounds;
use gabbro_shared::error::TerrainError;
use gabbro_shared::mesh::PackedMesh;
use gabbro_shared::quad::PackedQuad;

use crate::context::TerrainContext;
use crate::frustum::CameraFrustum;

const COMMAND_STRIDE: u64 = std::mem::size_of::<wgpu::util::DrawIndexedIndirectArgs>() as u64;

/// What the embedding scene hands us once per frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameCamera {
    pub view_proj: Mat4,
    pub position: Vec3,
    pub seed: f32,
    pub quads_interleaving: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    position: [f32; 4],
    far_plane: [f32; 4],
    left_plane: [f32; 4],
    right_plane: [f32; 4],
    down_plane: [f32; 4],
    up_plane: [f32; 4],
    seed: f32,
    quads_interleaving: f32,
    _pad: [f32; 2],
}

const _: [(); 176] = [(); std::mem::size_of::<CameraUniform>()];

impl CameraUniform {
    fn new(frame: &FrameCamera, frustum: &CameraFrustum) -> Self {
        Self {
            view_proj: frame.view_proj.to_cols_array_2d(),
            position: frame.position.extend(1.0).to_array(),
            far_plane: frustum.far.to_array(),
            left_plane: frustum.left.to_array(),
            right_plane: frustum.right.to_array(),
            down_plane: frustum.down.to_array(),
            up_plane: frustum.up.to_array(),
            seed: frame.seed,
            quads_interleaving: frame.quads_interleaving,
            _pad: [0.0; 2],
        }
    }
}

struct PublishedTerrain {
    bounds: WorldBounds,
    quad_count: u32,
    mesh_count: u32,
    camera_buffer: wgpu::Buffer,
    command_buffer: wgpu::Buffer,
    // The quad and mesh table buffers live on inside these bind groups.
    cull_bind_group: wgpu::BindGroup,
    draw_bind_group: wgpu::BindGroup,
}

/// Owns one published terrain and its per-frame culling. The mesh set is
/// immutable after `publish`; each frame either draws the whole visible
/// subset of it or, on any transient failure, nothing.
pub struct TerrainRenderer {
    context: Arc<TerrainContext>,
    published: Option<PublishedTerrain>,
}

impl TerrainRenderer {
    pub fn new(context: Arc<TerrainContext>) -> Self {
        Self {
            context,
            published: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.published.is_some()
    }

    pub fn bounds(&self) -> Option<WorldBounds> {
        self.published.as_ref().map(|published| published.bounds)
    }

    /// (quad table length, padded mesh table length) of the published set.
    pub fn table_sizes(&self) -> Option<(u32, u32)> {
        self.published
            .as_ref()
            .map(|published| (published.quad_count, published.mesh_count))
    }

    /// Mesh the columns and upload the immutable quad, mesh and command
    /// buffers. Fails without touching renderer state, so a publish that
    /// ran out of GPU headroom can be retried next frame; a second
    /// successful publish on the same renderer is refused.
    pub fn publish(
        &mut self,
        device: &wgpu::Device,
        bounds: WorldBounds,
        columns: &ColumnStore,
        config: &MeshingConfig,
        jobs: &JobSystem,
    ) -> Result<(), TerrainError> {
        if self.published.is_some() {
            return Err(TerrainError::State(
                "terrain is already published on this renderer".to_string(),
            ));
        }

        let terrain = build_terrain(columns, config, jobs)?;
        let (quads, meshes) = pad_tables(terrain);

        let limits = device.limits();
        let quad_bytes = (quads.len() * std::mem::size_of::<PackedQuad>()) as u64;
        let mesh_bytes = (meshes.len() * std::mem::size_of::<PackedMesh>()) as u64;
        let command_bytes = meshes.len() as u64 * COMMAND_STRIDE;
        let max_binding = u64::from(limits.max_storage_buffer_binding_size);
        if quad_bytes > max_binding || mesh_bytes > max_binding || command_bytes > max_binding {
            return Err(TerrainError::Resource(format!(
                "terrain tables ({quad_bytes} + {mesh_bytes} + {command_bytes} bytes) exceed the \
                 device storage binding limit {max_binding}"
            )));
        }

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Quad Table"),
            contents: bytemuck::cast_slice(&quads),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let mesh_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Mesh Table"),
            contents: bytemuck::cast_slice(&meshes),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let command_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Draw Commands"),
            size: command_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT,
            mapped_at_creation: false,
        });
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cull_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Terrain Cull Bind Group"),
            layout: &self.context.cull.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mesh_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: command_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.context.counter_buffer.as_entire_binding(),
                },
            ],
        });
        let draw_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Terrain Draw Bind Group"),
            layout: &self.context.quads.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: quad_buffer.as_entire_binding(),
                },
            ],
        });

        info!(
            "published terrain: {} quads, {} meshes ({} with padding)",
            quads.len(),
            meshes.iter().filter(|mesh| mesh.face_count() > 0).count(),
            meshes.len()
        );
        self.published = Some(PublishedTerrain {
            bounds,
            quad_count: quads.len() as u32,
            mesh_count: meshes.len() as u32,
            camera_buffer,
            command_buffer,
            cull_bind_group,
            draw_bind_group,
        });
        Ok(())
    }

    /// Record the per-frame culling work: refresh the camera uniform,
    /// reset the visible counter and dispatch one kernel thread per mesh
    /// table entry. When the device cannot source the draw count from the
    /// counter buffer, the counter is also copied out for `visible_count`.
    pub fn prepare_frame(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        frame: &FrameCamera,
    ) {
        let Some(published) = &self.published else {
            return;
        };

        let frustum = CameraFrustum::from_view_proj(frame.view_proj, frame.position);
        let uniform = CameraUniform::new(frame, &frustum);
        queue.write_buffer(&published.camera_buffer, 0, bytemuck::bytes_of(&uniform));
        queue.write_buffer(&self.context.counter_buffer, 0, bytemuck::bytes_of(&0u32));

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Terrain Cull Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(self.context.cull.pipeline());
        pass.set_bind_group(0, &published.cull_bind_group, &[]);
        pass.dispatch_workgroups(published.mesh_count / CULL_WORKGROUP_SIZE, 1, 1);
        drop(pass);

        if !self.context.supports_indirect_count {
            encoder.copy_buffer_to_buffer(
                &self.context.counter_buffer,
                0,
                &self.context.readback_buffer,
                0,
                std::mem::size_of::<u32>() as u64,
            );
        }
    }

    /// Read the culled command count back after the cull submission. Only
    /// needed on devices without GPU-side draw counts; failures draw
    /// nothing this frame instead of surfacing.
    pub fn visible_count(&self, device: &wgpu::Device) -> u32 {
        if self.published.is_none() || self.context.supports_indirect_count {
            return 0;
        }

        let slice = self.context.readback_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        match receiver.recv() {
            Ok(Ok(())) => {
                let count = {
                    let data = slice.get_mapped_range();
                    u32::from_le_bytes(data[..4].try_into().expect("counter is four bytes"))
                };
                self.context.readback_buffer.unmap();
                count
            }
            _ => {
                warn!("terrain visible-counter readback failed; drawing nothing this frame");
                0
            }
        }
    }

    /// Issue the indirect draws for the commands the kernel emitted. The
    /// command count comes from the counter buffer itself when the device
    /// supports it, otherwise from the `visible_count` readback.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, visible: u32) {
        let Some(published) = &self.published else {
            return;
        };

        pass.set_pipeline(self.context.quads.pipeline());
        pass.set_bind_group(0, &published.draw_bind_group, &[]);
        pass.set_index_buffer(
            self.context.index_buffer.slice(..),
            wgpu::IndexFormat::Uint16,
        );

        if self.context.supports_indirect_count {
            pass.multi_draw_indexed_indirect_count(
                &published.command_buffer,
                0,
                &self.context.counter_buffer,
                0,
                published.mesh_count,
            );
        } else if self.context.supports_multi_draw {
            pass.multi_draw_indexed_indirect(
                &published.command_buffer,
                0,
                visible.min(published.mesh_count),
            );
        } else {
            for command in 0..visible.min(published.mesh_count) {
                pass.draw_indexed_indirect(
                    &published.command_buffer,
                    u64::from(command) * COMMAND_STRIDE,
                );
            }
        }
    }
}

/// Round the mesh table up to whole culling workgroups with unrenderable
/// sentinels, and keep both storage bindings non-empty even for a bare
/// world.
fn pad_tables(terrain: MeshedTerrain) -> (Vec<PackedQuad>, Vec<PackedMesh>) {
    let mut quads = terrain.quads;
    let mut meshes = terrain.meshes;

    if quads.is_empty() {
        quads.push(PackedQuad::default());
    }
    let padded = meshes
        .len()
        .div_ceil(CULL_WORKGROUP_SIZE as usize)
        .max(1)
        * CULL_WORKGROUP_SIZE as usize;
    meshes.resize(padded, PackedMesh::none());

    (quads, meshes)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use gabbro_mesher::MeshedTerrain;
    use gabbro_shared::coords::NORMAL_NONE;
    use gabbro_shared::mesh::PackedMesh;
    use gabbro_shared::quad::PackedQuad;

    use super::pad_tables;

    #[test]
    fn mesh_table_pads_to_whole_workgroups() {
        let terrain = MeshedTerrain {
            quads: vec![PackedQuad::pack(1, 0, 0, 1, 1, 0, 1)],
            meshes: vec![PackedMesh::pack(Vec3::ZERO, Vec3::ONE, 0, 1, 0); 65],
        };
        let (quads, meshes) = pad_tables(terrain);

        assert_eq!(quads.len(), 1);
        assert_eq!(meshes.len(), 128);
        assert_eq!(meshes[64].normal(), 0);
        assert_eq!(meshes[65].normal(), NORMAL_NONE);
        assert_eq!(meshes[65].face_count(), 0);
    }

    #[test]
    fn empty_terrain_still_produces_bindable_tables() {
        let (quads, meshes) = pad_tables(MeshedTerrain::default());
        assert_eq!(quads.len(), 1);
        assert_eq!(meshes.len(), 64);
        assert!(meshes.iter().all(|mesh| mesh.normal() == NORMAL_NONE));
    }
}
