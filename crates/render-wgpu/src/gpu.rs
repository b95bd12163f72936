use crate::shaders;
use bytemuck::{Pod, Zeroable};
use farview_common::{RegionRect, RenderError, RenderResult};
use farview_render::{ModernHandshake, PixelTarget, Surface, SurfaceProvider, TextureContext};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BlitVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

/// Fullscreen quad with Y-flipped texture coordinates: uv (0, 0) maps to
/// NDC (-1, 1) so texture row 0 lands at the top of the target.
#[rustfmt::skip]
const QUAD_VERTICES: [BlitVertex; 6] = [
    BlitVertex { position: [-1.0,  1.0], uv: [0.0, 0.0] },
    BlitVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    BlitVertex { position: [ 1.0, -1.0], uv: [1.0, 1.0] },
    BlitVertex { position: [-1.0,  1.0], uv: [0.0, 0.0] },
    BlitVertex { position: [ 1.0, -1.0], uv: [1.0, 1.0] },
    BlitVertex { position: [ 1.0,  1.0], uv: [1.0, 0.0] },
];

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Everything a ready texture context owns: device, queue, blit pipeline,
/// the painted texture, and the offscreen render target.
struct GpuCore {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    target_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Full synchronous device negotiation: adapter, device, pipeline, and the
/// initial texture allocation. The raster tier calls this inline; the modern
/// tier calls it from a background thread.
fn negotiate(instance: &wgpu::Instance, width: u32, height: u32) -> RenderResult<GpuCore> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok_or_else(|| RenderError::Negotiation("no suitable adapter".into()))?;
    tracing::debug!(adapter = %adapter.get_info().name, "adapter selected");

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("farview_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
        },
        None,
    ))
    .map_err(|e| RenderError::Negotiation(e.to_string()))?;

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("blit_shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::BLIT_SHADER.into()),
    });

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("blit_sampler"),
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("blit_bind_group_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("blit_pipeline_layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("blit_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_blit"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<BlitVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x2,
                    1 => Float32x2,
                ],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_blit"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TEXTURE_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    });

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("blit_vertex_buffer"),
        contents: bytemuck::cast_slice(&QUAD_VERTICES),
        usage: wgpu::BufferUsages::VERTEX,
    });

    let width = width.max(1);
    let height = height.max(1);
    let texture = create_painted_texture(&device, width, height);
    let bind_group = create_bind_group(&device, &bind_group_layout, &texture, &sampler);
    let target_view = create_target_view(&device, width, height);

    Ok(GpuCore {
        device,
        queue,
        pipeline,
        bind_group_layout,
        sampler,
        vertex_buffer,
        texture,
        bind_group,
        target_view,
        width,
        height,
    })
}

fn create_painted_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("painted_texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &wgpu::Texture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let view = texture.create_view(&Default::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("blit_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn create_target_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("blit_target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    target.create_view(&Default::default())
}

/// [`TextureContext`] over a negotiated wgpu device.
struct WgpuTextureContext {
    core: Option<GpuCore>,
}

impl TextureContext for WgpuTextureContext {
    fn write_region(&mut self, rect: RegionRect, pixels: &[u8]) {
        let Some(core) = &self.core else {
            tracing::warn!("write_region on released context");
            return;
        };
        if pixels.len() != rect.byte_len() || !rect.fits_within(core.width, core.height) {
            tracing::warn!(?rect, len = pixels.len(), "rejecting out-of-range texture upload");
            return;
        }
        // Sub-rectangle upload only; the rest of the texture is untouched.
        core.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &core.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: rect.x,
                    y: rect.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(rect.width * 4),
                rows_per_image: Some(rect.height),
            },
            wgpu::Extent3d {
                width: rect.width,
                height: rect.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn reallocate(&mut self, width: u32, height: u32) {
        let Some(core) = &mut self.core else {
            tracing::warn!("reallocate on released context");
            return;
        };
        core.width = width.max(1);
        core.height = height.max(1);
        core.texture = create_painted_texture(&core.device, core.width, core.height);
        core.bind_group = create_bind_group(
            &core.device,
            &core.bind_group_layout,
            &core.texture,
            &core.sampler,
        );
        core.target_view = create_target_view(&core.device, core.width, core.height);
        tracing::debug!(width = core.width, height = core.height, "texture reallocated");
    }

    fn draw(&mut self) {
        let Some(core) = &self.core else {
            tracing::warn!("draw on released context");
            return;
        };
        let mut encoder = core
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("blit_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &core.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&core.pipeline);
            pass.set_bind_group(0, &core.bind_group, &[]);
            pass.set_vertex_buffer(0, core.vertex_buffer.slice(..));
            pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
        }
        core.queue.submit(std::iter::once(encoder.finish()));
    }

    fn release(&mut self) {
        if self.core.take().is_some() {
            tracing::debug!("wgpu texture context released");
        }
    }
}

/// A headless drawable surface: GPU tiers only, no CPU pixel path.
pub struct WgpuSurface {
    instance: wgpu::Instance,
    width: u32,
    height: u32,
}

impl Surface for WgpuSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixels(&mut self) -> Option<&mut dyn PixelTarget> {
        None
    }

    fn acquire_raster(&mut self) -> RenderResult<Box<dyn TextureContext>> {
        let core = negotiate(&self.instance, self.width, self.height)?;
        Ok(Box::new(WgpuTextureContext { core: Some(core) }))
    }

    fn acquire_modern(&mut self) -> RenderResult<ModernHandshake> {
        let (resolver, handshake) = ModernHandshake::channel();
        let instance = self.instance.clone();
        let (width, height) = (self.width, self.height);
        std::thread::Builder::new()
            .name("farview-wgpu-negotiate".into())
            .spawn(move || {
                let result = negotiate(&instance, width, height)
                    .map(|core| {
                        Box::new(WgpuTextureContext { core: Some(core) }) as Box<dyn TextureContext>
                    });
                resolver.resolve(result);
            })
            .map_err(|e| RenderError::Negotiation(e.to_string()))?;
        Ok(handshake)
    }
}

/// Creates headless wgpu surfaces over one shared instance.
pub struct WgpuSurfaceProvider {
    instance: wgpu::Instance,
}

impl WgpuSurfaceProvider {
    pub fn new() -> Self {
        Self {
            instance: wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            }),
        }
    }
}

impl Default for WgpuSurfaceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceProvider for WgpuSurfaceProvider {
    fn create_surface(&self, width: u32, height: u32) -> RenderResult<Box<dyn Surface>> {
        Ok(Box::new(WgpuSurface {
            instance: self.instance.clone(),
            width,
            height,
        }))
    }
}
