use log::debug;
use pollster::FutureExt;
use wgpu::{ BindGroup, BindGroupLayout, Device, Queue };

use crate::error::InitError;
use crate::glyph::{ self, GlyphCode, GlyphMetrics, Rasterizer, GLYPH_COUNT };
use crate::texture::GlyphTexture;

/// One texture and bind group per ASCII code point, plus normalized metrics.
pub struct GlyphAtlas {
    textures: Vec<GlyphTexture>,
    bind_groups: Vec<BindGroup>,
    metrics: GlyphMetrics,
}

impl GlyphAtlas {
    /// Rasterizes and uploads all 128 glyphs. Fails as a whole.
    pub fn new<R: Rasterizer + ?Sized>(
        device: &Device,
        queue: &Queue,
        rasterizer: &R,
        pixel_size: f32,
        layout: &BindGroupLayout
    ) -> Result<Self, InitError> {
        let glyphs = glyph::rasterize_all(rasterizer, pixel_size);

        // Normalize before touching the GPU so a bad font uploads nothing.
        let metrics = GlyphMetrics::from_glyphs(&glyphs)?;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let mut textures = Vec::with_capacity(GLYPH_COUNT);
        let mut bind_groups = Vec::with_capacity(GLYPH_COUNT);
        for code in GlyphCode::all() {
            let label = format!("Glyph {}", code.index());
            let texture = GlyphTexture::from_glyph(device, queue, &glyphs[code.index()], &label);

            bind_groups.push(
                device.create_bind_group(
                    &(wgpu::BindGroupDescriptor {
                        layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(&texture.view),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(&texture.sampler),
                            },
                        ],
                        label: Some(label.as_str()),
                    })
                )
            );
            textures.push(texture);
        }

        if let Some(err) = device.pop_error_scope().block_on() {
            return Err(InitError::Gpu(err.to_string()));
        }

        debug!("uploaded {} glyph textures at {}px", textures.len(), pixel_size);

        Ok(Self {
            textures,
            bind_groups,
            metrics,
        })
    }

    pub fn metrics(&self) -> &GlyphMetrics {
        &self.metrics
    }

    pub fn bind_group(&self, code: GlyphCode) -> &BindGroup {
        &self.bind_groups[code.index()]
    }

    /// Releases the glyph textures. The atlas must not be drawn afterwards.
    pub fn destroy(&self) {
        for texture in &self.textures {
            texture.texture.destroy();
        }
    }

    /// Texture bind group layout shared by every glyph.
    pub fn bind_group_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(
            &(wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
                label: Some("glyph_bind_group_layout"),
            })
        )
    }
}
