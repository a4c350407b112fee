//! Geometry pass: instanced icospheres into the view-space G-buffer.
//!
//! Each particle is one instance of a shared unit-sphere mesh, positioned
//! and scaled from the packaged `[x, y, z, size]` snapshot. The pass writes
//! view-space position and normal targets for the SSAO and lighting passes;
//! the alpha channel of the position target marks covered texels.

use wgpu::util::DeviceExt;

use crate::system::{ICOSAHEDRON_VERTICES, PACKED_STRIDE};

use super::ssao::SsaoPipeline;
use super::{DEPTH_FORMAT, GBUFFER_FORMAT};

/// Subdivision depth of the sphere mesh. Three levels give 1280 faces,
/// smooth enough at typical particle sizes.
const SPHERE_SUBDIVISIONS: u32 = 3;

/// Icosahedron faces, indices into [`ICOSAHEDRON_VERTICES`].
const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 4, 1],
    [0, 9, 4],
    [9, 5, 4],
    [4, 5, 8],
    [4, 8, 1],
    [8, 10, 1],
    [8, 3, 10],
    [5, 3, 8],
    [5, 2, 3],
    [2, 7, 3],
    [7, 10, 3],
    [7, 6, 10],
    [7, 11, 6],
    [11, 0, 6],
    [0, 1, 6],
    [6, 1, 10],
    [9, 0, 11],
    [9, 11, 2],
    [9, 2, 5],
    [7, 2, 11],
];

/// Unit-sphere triangle soup from recursive icosahedron subdivision.
/// Vertex positions double as normals.
pub(crate) fn icosphere_vertices(subdivisions: u32) -> Vec<[f32; 3]> {
    fn subdivide(
        a: glam::Vec3,
        b: glam::Vec3,
        c: glam::Vec3,
        depth: u32,
        out: &mut Vec<[f32; 3]>,
    ) {
        if depth == 0 {
            out.push(a.to_array());
            out.push(b.to_array());
            out.push(c.to_array());
            return;
        }
        let ab = a.midpoint(b).normalize();
        let bc = b.midpoint(c).normalize();
        let ca = c.midpoint(a).normalize();
        subdivide(a, ab, ca, depth - 1, out);
        subdivide(b, bc, ab, depth - 1, out);
        subdivide(c, ca, bc, depth - 1, out);
        subdivide(ab, bc, ca, depth - 1, out);
    }

    let mut vertices = Vec::new();
    for [i, j, k] in ICOSAHEDRON_FACES {
        subdivide(
            glam::Vec3::from_array(ICOSAHEDRON_VERTICES[i]).normalize(),
            glam::Vec3::from_array(ICOSAHEDRON_VERTICES[j]).normalize(),
            glam::Vec3::from_array(ICOSAHEDRON_VERTICES[k]).normalize(),
            subdivisions,
            &mut vertices,
        );
    }
    vertices
}

const GEOMETRY_SHADER: &str = r#"
struct FrameUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    time: f32,
    delta_time: f32,
}

@group(0) @binding(0) var<uniform> frame: FrameUniforms;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) instance: vec4<f32>,
}

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) view_pos: vec3<f32>,
    @location(1) view_normal: vec3<f32>,
}

@vertex
fn vs_main(in: VsIn) -> VsOut {
    let world = in.instance.xyz + in.position * in.instance.w;
    let view_pos = frame.view * vec4<f32>(world, 1.0);
    var out: VsOut;
    out.clip = frame.proj * view_pos;
    out.view_pos = view_pos.xyz;
    out.view_normal = (frame.view * vec4<f32>(in.position, 0.0)).xyz;
    return out;
}

struct GBufferOut {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
}

@fragment
fn fs_main(in: VsOut) -> GBufferOut {
    var out: GBufferOut;
    out.position = vec4<f32>(in.view_pos, 1.0);
    out.normal = vec4<f32>(normalize(in.view_normal), 0.0);
    return out;
}
"#;

pub(crate) struct GeometryPass {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    sphere_buffer: wgpu::Buffer,
    sphere_vertex_count: u32,
    instance_buffer: wgpu::Buffer,
    instance_capacity: u64,
    instance_count: u32,
}

impl GeometryPass {
    pub(crate) fn new(device: &wgpu::Device, frame_uniforms: &wgpu::Buffer) -> Self {
        let sphere = icosphere_vertices(SPHERE_SUBDIVISIONS);
        let sphere_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere Vertex Buffer"),
            contents: bytemuck::cast_slice(&sphere),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let instance_capacity = 1024;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Instance Buffer"),
            size: instance_capacity,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Geometry Bind Group Layout"),
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

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Geometry Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_uniforms.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Geometry Shader"),
            source: wgpu::ShaderSource::Wgsl(GEOMETRY_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Geometry Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Geometry Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: (PACKED_STRIDE * std::mem::size_of::<f32>())
                            as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x4,
                        }],
                    },
                ],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[
                    Some(wgpu::ColorTargetState {
                        format: GBUFFER_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                    Some(wgpu::ColorTargetState {
                        format: GBUFFER_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    }),
                ],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
            sphere_buffer,
            sphere_vertex_count: sphere.len() as u32,
            instance_buffer,
            instance_capacity,
            instance_count: 0,
        }
    }

    /// The packed particle buffer, shared with the link pass.
    pub(crate) fn instance_buffer(&self) -> &wgpu::Buffer {
        &self.instance_buffer
    }

    /// Upload the packaged particle snapshot, growing the instance buffer
    /// when the particle count outruns its capacity.
    pub(crate) fn upload_instances(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        packaged: &[f32],
    ) {
        let bytes = (packaged.len() * std::mem::size_of::<f32>()) as u64;
        if bytes > self.instance_capacity {
            self.instance_capacity = bytes.next_power_of_two();
            self.instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Particle Instance Buffer"),
                size: self.instance_capacity,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            log::debug!("Instance buffer grown to {} bytes", self.instance_capacity);
        }
        if !packaged.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(packaged));
        }
        self.instance_count = (packaged.len() / PACKED_STRIDE) as u32;
    }

    /// Rasterize all particles into the G-buffer targets.
    pub(crate) fn draw(&self, encoder: &mut wgpu::CommandEncoder, targets: &SsaoPipeline) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Geometry Pass"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: targets.position_view(),
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: targets.normal_view(),
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                }),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: targets.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if self.instance_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.sphere_buffer.slice(..));
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        pass.draw(0..self.sphere_vertex_count, 0..self.instance_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icosphere_vertex_count_scales_by_four() {
        for depth in 0..3 {
            let vertices = icosphere_vertices(depth);
            assert_eq!(vertices.len(), 20 * 4usize.pow(depth) * 3);
        }
    }

    #[test]
    fn icosphere_vertices_lie_on_unit_sphere() {
        for v in icosphere_vertices(2) {
            let len = glam::Vec3::from_array(v).length();
            assert!((len - 1.0).abs() < 1e-5, "vertex length {}", len);
        }
    }
}
