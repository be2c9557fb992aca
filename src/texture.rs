use crate::glyph::RasterizedGlyph;

static BLANK_TEXEL: [u8; 1] = [0];

/// Single-channel texture holding one rasterized glyph.
pub struct GlyphTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GlyphTexture {
    pub fn from_glyph(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        glyph: &RasterizedGlyph,
        label: &str
    ) -> Self {
        // Zero-sized textures are invalid, so blank glyphs get one empty texel.
        let (width, height, pixels) = if glyph.is_empty() {
            (1, 1, &BLANK_TEXEL[..])
        } else {
            (glyph.width as u32, glyph.height as u32, glyph.bitmap.as_slice())
        };

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(
            &(wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        );

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: Some(height),
            },
            size
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(
            &(wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            })
        );

        Self {
            texture,
            view,
            sampler,
        }
    }
}
