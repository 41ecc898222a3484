//! Lit, instanced mesh pipeline with an optional directional shadow map.
//!
//! Each frame the draw list is sorted by mesh (shadow casters first within a
//! mesh) and streamed into one instance buffer; every mesh then costs one
//! draw call in the main pass and at most one in the shadow pass. The shadow
//! map is recreated whenever the requested resolution changes.

use std::collections::HashMap;

use folio_core::draw::{DrawList, LightingRig, MeshKind};
use folio_core::settings::RenderConfig;
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::camera::{light_view_proj, PerspectiveCamera};
use crate::gpu_context::DEPTH_FORMAT;
use crate::mesh;
use crate::vertex::{InstanceRaw, MeshVertex};

const MAX_DIRECTIONAL: usize = 2;
const MAX_POINT: usize = 4;
const SHADOW_EXTENT: f32 = 15.0;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub params: [f32; 4],
    pub counts: [u32; 4],
    pub dir_direction: [[f32; 4]; MAX_DIRECTIONAL],
    pub dir_color: [[f32; 4]; MAX_DIRECTIONAL],
    pub point_position: [[f32; 4]; MAX_POINT],
    pub point_color: [[f32; 4]; MAX_POINT],
    pub spot_position: [f32; 4],
    pub spot_direction: [f32; 4],
    pub spot_color: [f32; 4],
}

impl SceneUniform {
    pub fn build(camera: &PerspectiveCamera, lighting: &LightingRig, config: &RenderConfig) -> Self {
        let mut uniform: SceneUniform = bytemuck::Zeroable::zeroed();
        uniform.view_proj = camera.view_proj().to_cols_array_2d();
        uniform.camera_pos = camera.position.extend(1.0).to_array();

        let caster = lighting.shadow_caster();
        let light_matrix = caster
            .map(|l| light_view_proj(l.position, SHADOW_EXTENT))
            .unwrap_or(Mat4::IDENTITY);
        uniform.light_view_proj = light_matrix.to_cols_array_2d();
        let shadows_on = config.enable_shadows && caster.is_some();
        uniform.params = [
            lighting.ambient,
            if shadows_on { 1.0 } else { 0.0 },
            1.0 / config.shadow_resolution.max(1) as f32,
            0.0,
        ];

        let directional: Vec<_> = lighting.directional.iter().take(MAX_DIRECTIONAL).collect();
        for (slot, light) in directional.iter().enumerate() {
            let dir = light.position.try_normalize().unwrap_or(Vec3::Y);
            uniform.dir_direction[slot] = dir.extend(light.intensity).to_array();
            let [r, g, b] = light.color;
            uniform.dir_color[slot] = [r, g, b, if light.casts_shadow { 1.0 } else { 0.0 }];
        }
        let points: Vec<_> = lighting.points.iter().take(MAX_POINT).collect();
        for (slot, light) in points.iter().enumerate() {
            uniform.point_position[slot] = light.position.extend(light.intensity).to_array();
            let [r, g, b] = light.color;
            uniform.point_color[slot] = [r, g, b, 1.0];
        }
        let spot = lighting.spots.first();
        if let Some(spot) = spot {
            uniform.spot_position = spot.position.extend(spot.intensity).to_array();
            let dir = (spot.target - spot.position).try_normalize().unwrap_or(-Vec3::Y);
            uniform.spot_direction = dir.extend(spot.angle.cos()).to_array();
            let [r, g, b] = spot.color;
            uniform.spot_color = [r, g, b, spot.penumbra];
        }
        uniform.counts = [
            directional.len() as u32,
            points.len() as u32,
            u32::from(spot.is_some()),
            0,
        ];
        uniform
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Contiguous instance range for one mesh; casters occupy `start..caster_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBatch {
    pub mesh: MeshKind,
    pub start: u32,
    pub caster_end: u32,
    pub end: u32,
}

/// Order instances by mesh with shadow casters first, producing one batch per mesh.
pub fn batch_instances(draws: &DrawList) -> (Vec<InstanceRaw>, Vec<MeshBatch>) {
    let mut instances = Vec::with_capacity(draws.len());
    let mut batches = Vec::new();
    for &mesh in MeshKind::ALL {
        let start = instances.len() as u32;
        instances.extend(
            draws
                .of_mesh(mesh)
                .filter(|d| d.casts_shadow)
                .map(InstanceRaw::from),
        );
        let caster_end = instances.len() as u32;
        instances.extend(
            draws
                .of_mesh(mesh)
                .filter(|d| !d.casts_shadow)
                .map(InstanceRaw::from),
        );
        let end = instances.len() as u32;
        if end > start {
            batches.push(MeshBatch {
                mesh,
                start,
                caster_end,
                end,
            });
        }
    }
    (instances, batches)
}

struct ShadowMap {
    resolution: u32,
    view: wgpu::TextureView,
}

pub struct SceneRenderer {
    main_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    /// Uniform only; the shadow pass cannot sample the map it writes.
    shadow_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    shadow_sampler: wgpu::Sampler,
    shadow: ShadowMap,
    meshes: HashMap<MeshKind, GpuMesh>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    batches: Vec<MeshBatch>,
    sample_count: u32,
}

impl SceneRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shadow_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Shadow Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&shadow_bind_group_layout],
            push_constant_ranges: &[],
        });

        let primitive = wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        };

        let main_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[MeshVertex::layout(), InstanceRaw::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive,
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });

        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&shadow_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_shadow"),
                buffers: &[MeshVertex::layout(), InstanceRaw::layout()],
                compilation_options: Default::default(),
            },
            fragment: None,
            primitive,
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniform Buffer"),
            size: std::mem::size_of::<SceneUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let shadow = create_shadow_map(device, 1);
        let bind_group = create_bind_group(
            device,
            &bind_group_layout,
            &uniform_buffer,
            &shadow.view,
            &shadow_sampler,
        );

        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Bind Group"),
            layout: &shadow_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let meshes = MeshKind::ALL
            .iter()
            .map(|&kind| {
                let data = mesh::build(kind);
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Vertex Buffer"),
                    contents: bytemuck::cast_slice(&data.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Index Buffer"),
                    contents: bytemuck::cast_slice(&data.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                (
                    kind,
                    GpuMesh {
                        vertex_buffer,
                        index_buffer,
                        index_count: data.indices.len() as u32,
                    },
                )
            })
            .collect();

        let instance_capacity = 256;
        let instance_buffer = create_instance_buffer(device, instance_capacity);

        Self {
            main_pipeline,
            shadow_pipeline,
            bind_group_layout,
            bind_group,
            shadow_bind_group,
            uniform_buffer,
            shadow_sampler,
            shadow,
            meshes,
            instance_buffer,
            instance_capacity,
            batches: Vec::new(),
            sample_count,
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn shadow_resolution(&self) -> u32 {
        self.shadow.resolution
    }

    /// Upload uniforms and instances for this frame.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera: &PerspectiveCamera,
        lighting: &LightingRig,
        draws: &DrawList,
        config: &RenderConfig,
    ) {
        let wanted = config.shadow_resolution.max(1);
        if config.enable_shadows && wanted != self.shadow.resolution {
            log::debug!("Shadow map {} -> {}", self.shadow.resolution, wanted);
            self.shadow = create_shadow_map(device, wanted);
            self.bind_group = create_bind_group(
                device,
                &self.bind_group_layout,
                &self.uniform_buffer,
                &self.shadow.view,
                &self.shadow_sampler,
            );
        }

        let uniform = SceneUniform::build(camera, lighting, config);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));

        let (instances, batches) = batch_instances(draws);
        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(device, self.instance_capacity);
        }
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        self.batches = batches;
    }

    pub fn render_shadows(&self, encoder: &mut wgpu::CommandEncoder, config: &RenderConfig) {
        if !config.enable_shadows {
            return;
        }
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        pass.set_pipeline(&self.shadow_pipeline);
        pass.set_bind_group(0, &self.shadow_bind_group, &[]);
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for batch in &self.batches {
            if batch.caster_end == batch.start {
                continue;
            }
            let Some(mesh) = self.meshes.get(&batch.mesh) else {
                continue;
            };
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, batch.start..batch.caster_end);
        }
    }

    pub fn render_main(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        resolve_target: Option<&wgpu::TextureView>,
        depth_view: &wgpu::TextureView,
        clear_color: wgpu::Color,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    // Only the resolved image is needed after a multisampled pass.
                    store: if resolve_target.is_some() {
                        wgpu::StoreOp::Discard
                    } else {
                        wgpu::StoreOp::Store
                    },
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        pass.set_pipeline(&self.main_pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for batch in &self.batches {
            let Some(mesh) = self.meshes.get(&batch.mesh) else {
                continue;
            };
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, batch.start..batch.end);
        }
    }
}

fn create_shadow_map(device: &wgpu::Device, resolution: u32) -> ShadowMap {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Shadow Map"),
        size: wgpu::Extent3d {
            width: resolution,
            height: resolution,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    ShadowMap {
        resolution,
        view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    shadow_view: &wgpu::TextureView,
    shadow_sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Scene Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(shadow_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(shadow_sampler),
            },
        ],
    })
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    let byte_len = (capacity * std::mem::size_of::<InstanceRaw>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::draw::DrawInstance;
    use folio_core::tier::PerformanceTier;

    #[test]
    fn uniform_matches_wgsl_layout_size() {
        assert_eq!(std::mem::size_of::<SceneUniform>(), 416);
        assert_eq!(std::mem::size_of::<SceneUniform>() % 16, 0);
    }

    #[test]
    fn default_rig_fills_light_slots() {
        let camera = PerspectiveCamera::new(800, 600);
        let config = folio_core::settings::resolve(PerformanceTier::High, 1.0);
        let uniform = SceneUniform::build(&camera, &LightingRig::default(), &config);
        assert_eq!(uniform.counts, [2, 3, 1, 0]);
        assert_eq!(uniform.params[1], 1.0);
        assert_eq!(uniform.dir_color[0][3], 1.0);
        assert_eq!(uniform.dir_color[1][3], 0.0);
    }

    #[test]
    fn low_tier_disables_shadow_sampling() {
        let camera = PerspectiveCamera::new(800, 600);
        let config = folio_core::settings::resolve(PerformanceTier::Low, 1.0);
        let uniform = SceneUniform::build(&camera, &LightingRig::default(), &config);
        assert_eq!(uniform.params[1], 0.0);
    }

    #[test]
    fn batches_group_by_mesh_with_casters_first() {
        let mut draws = DrawList::new();
        let caster = DrawInstance::new(MeshKind::Sphere, Mat4::IDENTITY, [1.0; 4]);
        draws.push(caster.without_shadow());
        draws.push(caster);
        draws.push(DrawInstance::new(MeshKind::Cube, Mat4::IDENTITY, [0.5; 4]));
        draws.push(caster);

        let (instances, batches) = batch_instances(&draws);
        assert_eq!(instances.len(), 4);
        assert_eq!(
            batches,
            vec![
                MeshBatch {
                    mesh: MeshKind::Cube,
                    start: 0,
                    caster_end: 1,
                    end: 1
                },
                MeshBatch {
                    mesh: MeshKind::Sphere,
                    start: 1,
                    caster_end: 3,
                    end: 4
                },
            ]
        );
    }
}
