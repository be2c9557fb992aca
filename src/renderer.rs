//! Draws ASCII text from the glyph atlas, one textured quad per glyph.

use std::mem;

use log::{ debug, info, trace };
use pollster::FutureExt;
use wgpu::util::DeviceExt;
use wgpu::{ Buffer, Device, Queue };

use crate::atlas::GlyphAtlas;
use crate::config::Config;
use crate::error::{ InitError, TextError };
use crate::glyph;
use crate::shader;
use crate::text::{ GlyphQuad, TextLayout };

const INITIAL_QUAD_CAPACITY: usize = 256;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

// unit square as two triangles
const UNIT_QUAD: [Vertex; 6] = [
    Vertex { position: [0.0, 0.0] },
    Vertex { position: [1.0, 0.0] },
    Vertex { position: [1.0, 1.0] },
    Vertex { position: [0.0, 0.0] },
    Vertex { position: [1.0, 1.0] },
    Vertex { position: [0.0, 1.0] },
];

/// Per-draw corners of the glyph quad, in clip space.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadInstance {
    top_left: [f32; 2],
    bottom_right: [f32; 2],
}

impl QuadInstance {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<QuadInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

impl From<&GlyphQuad> for QuadInstance {
    fn from(quad: &GlyphQuad) -> Self {
        Self {
            top_left: quad.top_left.to_array(),
            bottom_right: quad.bottom_right.to_array(),
        }
    }
}

/// Instance data for `quads`, one entry per draw in the same order.
fn pack_quads(quads: &[GlyphQuad]) -> Vec<QuadInstance> {
    quads.iter().map(QuadInstance::from).collect()
}

/// Where a batch of instances goes in the instance buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    /// Appended to the current buffer at this instance index.
    Fits { start: usize },
    /// The current buffer is full; a new one of this capacity starts at 0.
    Grow { capacity: usize },
}

/// Bookkeeping for the instance buffer. Every `write` within a frame gets its
/// own region, so staged uploads never overwrite earlier draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InstanceSlots {
    capacity: usize,
    used: usize,
    max: usize,
}

impl InstanceSlots {
    fn new(capacity: usize, max: usize) -> Self {
        Self {
            capacity: capacity.min(max),
            used: 0,
            max,
        }
    }

    fn claim(&mut self, count: usize) -> Result<Claim, TextError> {
        if count > self.max {
            return Err(TextError::TooManyGlyphs { glyphs: count, max: self.max });
        }

        if self.used + count <= self.capacity {
            let start = self.used;
            self.used += count;
            return Ok(Claim::Fits { start });
        }

        let capacity = count.max(self.capacity * 2).next_power_of_two().min(self.max);
        self.capacity = capacity;
        self.used = count;
        Ok(Claim::Grow { capacity })
    }

    fn reset(&mut self) {
        self.used = 0;
    }
}

pub struct GlyphAtlasRenderer {
    config: Config,
    atlas: GlyphAtlas,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: Buffer,
    instance_buffer: Buffer,
    slots: InstanceSlots,
}

impl GlyphAtlasRenderer {
    pub fn new(
        device: &Device,
        queue: &Queue,
        format: wgpu::TextureFormat,
        config: Config
    ) -> Result<Self, InitError> {
        let font = glyph::load_font(&config.font_path)?;
        debug!("loaded font {}", config.font_path.display());

        let glyph_layout = GlyphAtlas::bind_group_layout(device);
        let atlas = GlyphAtlas::new(device, queue, &font, config.pixel_size, &glyph_layout)?;

        let vertex_shader = shader::compile(device, &config.vertex_shader)?;
        let fragment_shader = shader::compile(device, &config.fragment_shader)?;

        let render_pipeline_layout = device.create_pipeline_layout(
            &(wgpu::PipelineLayoutDescriptor {
                label: Some("Text Pipeline Layout"),
                bind_group_layouts: &[&glyph_layout],
                push_constant_ranges: &[],
            })
        );

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let render_pipeline = device.create_render_pipeline(
            &(wgpu::RenderPipelineDescriptor {
                label: Some("Text Pipeline"),
                layout: Some(&render_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_shader,
                    entry_point: Some("vs_main"),
                    buffers: &[Vertex::desc(), QuadInstance::desc()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_shader,
                    entry_point: Some("fs_main"),
                    targets: &[
                        Some(wgpu::ColorTargetState {
                            format,
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        }),
                    ],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        );
        if let Some(err) = device.pop_error_scope().block_on() {
            return Err(InitError::Pipeline {
                vertex: config.vertex_shader.clone(),
                fragment: config.fragment_shader.clone(),
                message: err.to_string(),
            });
        }

        let max_quads = (device.limits().max_buffer_size /
            (mem::size_of::<QuadInstance>() as u64)) as usize;
        let slots = InstanceSlots::new(INITIAL_QUAD_CAPACITY, max_quads);

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let vertex_buffer = device.create_buffer_init(
            &(wgpu::util::BufferInitDescriptor {
                label: Some("Unit Quad"),
                contents: bytemuck::cast_slice(&UNIT_QUAD),
                usage: wgpu::BufferUsages::VERTEX,
            })
        );
        let instance_buffer = create_instance_buffer(device, slots.capacity);
        if let Some(err) = device.pop_error_scope().block_on() {
            return Err(InitError::Gpu(err.to_string()));
        }

        info!(
            "glyph atlas ready: {} glyphs from {} at {}px",
            glyph::GLYPH_COUNT,
            config.font_path.display(),
            config.pixel_size
        );

        Ok(Self {
            config,
            atlas,
            render_pipeline,
            vertex_buffer,
            instance_buffer,
            slots,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn text_layout(&self) -> TextLayout<'_> {
        TextLayout::new(self.atlas.metrics(), &self.config)
    }

    pub fn text_width(&self, text: &str) -> Result<f32, TextError> {
        self.text_layout().text_width(text)
    }

    pub fn text_height(&self, text: &str) -> Result<f32, TextError> {
        self.text_layout().text_height(text)
    }

    /// Marks the instance buffer free for reuse. Call once per frame, before
    /// the first `write`.
    pub fn begin_frame(&mut self) {
        self.slots.reset();
    }

    /// Records one draw per glyph of `text` into `render_pass`, scaled to fit
    /// the layout box. Returns the number of draws.
    pub fn write(
        &mut self,
        device: &Device,
        queue: &Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
        text: &str
    ) -> Result<usize, TextError> {
        let quads = self.text_layout().layout(text)?;
        if quads.is_empty() {
            return Ok(0);
        }

        let start = match self.slots.claim(quads.len())? {
            Claim::Fits { start } => start,
            Claim::Grow { capacity } => {
                debug!("growing glyph instance buffer to {}", capacity);
                // draws already recorded keep the old buffer alive
                self.instance_buffer = create_instance_buffer(device, capacity);
                0
            }
        };

        let offset = (start * mem::size_of::<QuadInstance>()) as wgpu::BufferAddress;
        queue.write_buffer(&self.instance_buffer, offset, bytemuck::cast_slice(&pack_quads(&quads)));

        render_pass.set_pipeline(&self.render_pipeline);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for (i, quad) in quads.iter().enumerate() {
            let instance = (start + i) as u32;
            render_pass.set_bind_group(0, self.atlas.bind_group(quad.code), &[]);
            render_pass.draw(0..UNIT_QUAD.len() as u32, instance..instance + 1);
        }

        trace!("recorded {} glyph draws at instance {}", quads.len(), start);
        Ok(quads.len())
    }
}

impl Drop for GlyphAtlasRenderer {
    fn drop(&mut self) {
        self.atlas.destroy();
        self.vertex_buffer.destroy();
        self.instance_buffer.destroy();
        debug!("released glyph atlas renderer");
    }
}

fn create_instance_buffer(device: &Device, quads: usize) -> Buffer {
    device.create_buffer(
        &(wgpu::BufferDescriptor {
            label: Some("Glyph Instances"),
            size: (quads * mem::size_of::<QuadInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::glyph::GlyphCode;

    fn quad(x: f32) -> GlyphQuad {
        GlyphQuad {
            code: GlyphCode::REFERENCE,
            origin: Point::new(x, 0.0),
            top_left: Point::new(x, 0.5),
            bottom_right: Point::new(x + 0.1, -0.25),
        }
    }

    #[test]
    fn test_unit_quad_covers_square() {
        assert_eq!(UNIT_QUAD.len(), 6);
        for vertex in &UNIT_QUAD {
            let [x, y] = vertex.position;
            assert!((0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y));
        }
        // both triangles share the diagonal
        assert_eq!(UNIT_QUAD[0].position, UNIT_QUAD[3].position);
        assert_eq!(UNIT_QUAD[2].position, UNIT_QUAD[4].position);
    }

    #[test]
    fn test_instance_layout() {
        assert_eq!(mem::size_of::<QuadInstance>(), 16);
        assert_eq!(mem::size_of::<Vertex>(), 8);
    }

    #[test]
    fn test_pack_quads_in_draw_order() {
        let quads = [quad(-0.9), quad(-0.5), quad(0.25)];
        let packed = pack_quads(&quads);

        assert_eq!(packed.len(), quads.len());
        for (instance, quad) in packed.iter().zip(&quads) {
            assert_eq!(instance.top_left, quad.top_left.to_array());
            assert_eq!(instance.bottom_right, quad.bottom_right.to_array());
        }

        // instance i occupies bytes [16 * i, 16 * i + 16)
        let bytes: &[u8] = bytemuck::cast_slice(&packed);
        assert_eq!(bytes.len(), 48);
        let second: &[QuadInstance] = bytemuck::cast_slice(&bytes[16..32]);
        assert_eq!(second, &[QuadInstance::from(&quads[1])]);
    }

    #[test]
    fn test_writes_in_one_frame_get_disjoint_regions() {
        let mut slots = InstanceSlots::new(16, 1024);

        assert_eq!(slots.claim(5), Ok(Claim::Fits { start: 0 }));
        assert_eq!(slots.claim(7), Ok(Claim::Fits { start: 5 }));
        assert_eq!(slots.claim(4), Ok(Claim::Fits { start: 12 }));
        assert_eq!(slots.used, 16);
    }

    #[test]
    fn test_begin_frame_reuses_buffer() {
        let mut slots = InstanceSlots::new(16, 1024);

        assert_eq!(slots.claim(10), Ok(Claim::Fits { start: 0 }));
        slots.reset();
        assert_eq!(slots.claim(10), Ok(Claim::Fits { start: 0 }));
    }

    #[test]
    fn test_overflow_grows_into_fresh_buffer() {
        let mut slots = InstanceSlots::new(16, 1024);

        assert_eq!(slots.claim(10), Ok(Claim::Fits { start: 0 }));
        assert_eq!(slots.claim(10), Ok(Claim::Grow { capacity: 32 }));
        assert_eq!(slots.claim(20), Ok(Claim::Fits { start: 10 }));
        assert_eq!(slots.claim(100), Ok(Claim::Grow { capacity: 128 }));
    }

    #[test]
    fn test_growth_capped_at_device_limit() {
        let mut slots = InstanceSlots::new(256, 1000);

        assert_eq!(slots.claim(999), Ok(Claim::Grow { capacity: 1000 }));
        assert_eq!(slots.claim(1000), Ok(Claim::Grow { capacity: 1000 }));
        assert_eq!(
            slots.claim(1001),
            Err(TextError::TooManyGlyphs { glyphs: 1001, max: 1000 })
        );
    }

    #[test]
    fn test_oversized_text_is_reported_not_allocated() {
        // downlevel max_buffer_size is 1 << 28 bytes
        let max = (1usize << 28) / mem::size_of::<QuadInstance>();
        let mut slots = InstanceSlots::new(INITIAL_QUAD_CAPACITY, max);

        assert!(matches!(slots.claim(max + 1), Err(TextError::TooManyGlyphs { .. })));
        assert_eq!(slots.capacity, INITIAL_QUAD_CAPACITY);
    }
}
