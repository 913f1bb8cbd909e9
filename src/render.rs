use crate::camera::Camera;
use crate::mesh::{DecodedModel, ModelVertex};
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use std::sync::mpsc;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

/// Viewport background, 0x1a1a2e converted from sRGB to linear.
const CLEAR_COLOR: wgpu::Color =
    wgpu::Color { r: 0.010330, g: 0.010330, b: 0.027321, a: 1.0 };

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
}

/// One finished thumbnail: PNG bytes, the same bytes as an embeddable data
/// URL, and the model's triangle count measured during decode.
#[derive(Debug, Clone)]
pub struct RenderedThumbnail {
    pub png: Vec<u8>,
    pub data_url: String,
    pub poly_count: i64,
}

/// Whether any usable GPU adapter exists. Probed once per process; machines
/// without one browse the catalog with placeholder tiles instead of failing.
pub fn gpu_available() -> bool {
    static PROBE: OnceLock<bool> = OnceLock::new();
    *PROBE.get_or_init(|| {
        let instance = wgpu::Instance::default();
        let available = pollster::block_on(instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .is_ok();
        if !available {
            warn!("[render] no GPU adapter found, thumbnail rendering disabled");
        }
        available
    })
}

struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    globals_buf: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    color_target: wgpu::TextureView,
    color_texture: wgpu::Texture,
    depth_target: wgpu::TextureView,
    resolution: u32,
}

impl GpuContext {
    fn new(resolution: u32) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .context("No suitable GPU adapter")?;
        info!("[render] using adapter: {}", adapter.get_info().name);

        let device_desc = wgpu::DeviceDescriptor {
            label: Some("Thumbnail Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };
        let (device, queue) = pollster::block_on(adapter.request_device(&device_desc))
            .context("Failed to create GPU device")?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Thumbnail Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../assets/shaders/thumbnail_mesh.wgsl").into(),
            ),
        });

        let globals_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Thumbnail Globals BGL"),
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
        let globals_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Thumbnail Globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Thumbnail Globals BG"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals_buf.as_entire_binding() }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Thumbnail Pipeline Layout"),
            bind_group_layouts: &[&globals_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Thumbnail Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[ModelVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
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

        let extent = wgpu::Extent3d { width: resolution, height: resolution, depth_or_array_layers: 1 };
        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Thumbnail Color"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Thumbnail Depth"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_target = color_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_target = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            device,
            queue,
            pipeline,
            globals_buf,
            globals_bg,
            color_target,
            color_texture,
            depth_target,
            resolution,
        })
    }
}

/// Offscreen renderer producing square PNG thumbnails. The GPU context is
/// created lazily on the first render and reused for the rest of the
/// process; per-model buffers are destroyed as soon as the frame is read
/// back.
pub struct ThumbnailRenderer {
    resolution: u32,
    context: Option<GpuContext>,
}

impl ThumbnailRenderer {
    pub fn new(resolution: u32) -> Self {
        Self { resolution: resolution.max(16), context: None }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Renders one decoded model. `Ok(None)` means no GPU is available and
    /// rendering is skipped entirely; `Err` means this model failed.
    pub fn render(&mut self, model: &DecodedModel) -> Result<Option<RenderedThumbnail>> {
        if !gpu_available() {
            return Ok(None);
        }
        if self.context.is_none() {
            self.context = Some(GpuContext::new(self.resolution)?);
        }
        let ctx = self.context.as_ref().ok_or_else(|| anyhow!("GPU context missing"))?;

        let camera = Camera::framing(&model.bounds);
        let globals = Globals { view_proj: camera.view_projection(1.0).to_cols_array_2d() };
        ctx.queue.write_buffer(&ctx.globals_buf, 0, bytemuck::bytes_of(&globals));

        let draw_buffers = if model.is_empty() {
            None
        } else {
            let vb = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Thumbnail VB"),
                contents: bytemuck::cast_slice(&model.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let ib = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Thumbnail IB"),
                contents: bytemuck::cast_slice(&model.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            Some((vb, ib))
        };

        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = ctx.resolution * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        let readback = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Thumbnail Readback"),
            size: (padded_bytes_per_row * ctx.resolution) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Thumbnail Encoder") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Thumbnail Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &ctx.color_target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_target,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if let Some((vb, ib)) = &draw_buffers {
                pass.set_pipeline(&ctx.pipeline);
                pass.set_bind_group(0, &ctx.globals_bg, &[]);
                pass.set_vertex_buffer(0, vb.slice(..));
                pass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..model.indices.len() as u32, 0, 0..1);
            }
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &ctx.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(ctx.resolution),
                },
            },
            wgpu::Extent3d { width: ctx.resolution, height: ctx.resolution, depth_or_array_layers: 1 },
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        ctx.device.poll(wgpu::PollType::wait_indefinitely()).context("GPU poll failed")?;
        rx.recv()
            .context("Readback mapping was dropped")?
            .context("Failed to map readback buffer")?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * ctx.resolution) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        readback.unmap();
        readback.destroy();
        if let Some((vb, ib)) = draw_buffers {
            vb.destroy();
            ib.destroy();
        }

        let png = encode_png(ctx.resolution, &pixels)?;
        let data_url = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        );
        debug!(
            "[render] rendered {} triangles into {} PNG bytes",
            model.triangle_count,
            png.len()
        );
        Ok(Some(RenderedThumbnail { png, data_url, poly_count: model.triangle_count }))
    }
}

fn encode_png(resolution: u32, rgba: &[u8]) -> Result<Vec<u8>> {
    let image = image::RgbaImage::from_raw(resolution, resolution, rgba.to_vec())
        .ok_or_else(|| anyhow!("Readback size mismatch for {resolution}x{resolution} frame"))?;
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .context("Failed to encode thumbnail PNG")?;
    Ok(out.into_inner())
}
