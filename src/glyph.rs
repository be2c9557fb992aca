//! Per-glyph metrics for the 128 ASCII code points.
//!
//! Metrics are rasterized once and normalized so the reference glyph has
//! height 1, which keeps layout independent of the rasterization size.

use std::fmt;
use std::fs;
use std::path::Path;

use fontdue::{ Font, FontSettings };
use log::{ debug, warn };

use crate::error::{ InitError, TextError };
use crate::geometry::{ Bounds, Point };

pub const GLYPH_COUNT: usize = 128;

/// A validated ASCII code point.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlyphCode(u8);

impl GlyphCode {
    /// Glyph whose height defines the unit of the normalized space.
    pub const REFERENCE: GlyphCode = GlyphCode(b'{');
    pub const NEWLINE: GlyphCode = GlyphCode(b'\n');

    pub fn all() -> impl Iterator<Item = GlyphCode> {
        (0..GLYPH_COUNT as u8).map(GlyphCode)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }

    /// Printable codes, excluding space and DEL.
    pub fn is_visible(self) -> bool {
        self.0.is_ascii_graphic()
    }
}

impl TryFrom<char> for GlyphCode {
    type Error = TextError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        if c.is_ascii() {
            Ok(GlyphCode(c as u8))
        } else {
            Err(TextError::InvalidCharacter(c))
        }
    }
}

impl fmt::Display for GlyphCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_char())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlyphRecord {
    pub width: f32,
    pub height: f32,
    pub advance: f32,
    /// Distance from the baseline up to the top of the glyph box.
    pub bearing_y: f32,
}

impl GlyphRecord {
    fn scaled(self, factor: f32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
            advance: self.advance * factor,
            bearing_y: self.bearing_y * factor,
        }
    }
}

/// Output of the font rasterizer for one code point, in pixels.
#[derive(Clone, Debug, Default)]
pub struct RasterizedGlyph {
    pub width: usize,
    pub height: usize,
    pub advance: f32,
    pub bearing_y: f32,
    /// Row-major coverage, one byte per pixel, top row first.
    pub bitmap: Vec<u8>,
}

impl RasterizedGlyph {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn record(&self) -> GlyphRecord {
        GlyphRecord {
            width: self.width as f32,
            height: self.height as f32,
            advance: self.advance,
            bearing_y: self.bearing_y,
        }
    }
}

/// Source of glyph bitmaps and metrics.
pub trait Rasterizer {
    fn rasterize(&self, code: GlyphCode, pixel_size: f32) -> RasterizedGlyph;

    /// Whether the font has a real glyph for `code` rather than a fallback.
    fn covers(&self, _code: GlyphCode) -> bool {
        true
    }
}

impl Rasterizer for Font {
    fn rasterize(&self, code: GlyphCode, pixel_size: f32) -> RasterizedGlyph {
        let (metrics, bitmap) = Font::rasterize(self, code.as_char(), pixel_size);

        RasterizedGlyph {
            width: metrics.width,
            height: metrics.height,
            advance: metrics.advance_width,
            // ymin is the offset of the bitmap's bottom edge from the baseline
            bearing_y: (metrics.ymin as f32) + (metrics.height as f32),
            bitmap,
        }
    }

    fn covers(&self, code: GlyphCode) -> bool {
        self.lookup_glyph_index(code.as_char()) != 0
    }
}

pub fn load_font(path: &Path) -> Result<Font, InitError> {
    let bytes = fs::read(path).map_err(|e| InitError::FontLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Font::from_bytes(bytes, FontSettings::default()).map_err(|reason| InitError::FontLoad {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    })
}

/// Rasterizes every ASCII code point at `pixel_size`, indexed by code.
pub fn rasterize_all<R: Rasterizer + ?Sized>(
    rasterizer: &R,
    pixel_size: f32
) -> Box<[RasterizedGlyph; GLYPH_COUNT]> {
    let missing = GlyphCode::all()
        .filter(|code| code.is_visible() && !rasterizer.covers(*code))
        .count();
    if missing > 0 {
        warn!("font has no glyph for {} printable ASCII characters", missing);
    }

    Box::new(std::array::from_fn(|i| rasterizer.rasterize(GlyphCode(i as u8), pixel_size)))
}

/// Normalized metrics for all 128 code points. Immutable once built.
#[derive(Clone, Debug)]
pub struct GlyphMetrics {
    records: [GlyphRecord; GLYPH_COUNT],
}

impl GlyphMetrics {
    pub fn from_glyphs(glyphs: &[RasterizedGlyph; GLYPH_COUNT]) -> Result<Self, InitError> {
        let reference_height = glyphs[GlyphCode::REFERENCE.index()].height as f32;
        if !reference_height.is_finite() || reference_height <= 0.0 {
            return Err(InitError::DegenerateReference(reference_height));
        }

        let factor = 1.0 / reference_height;
        debug!("normalizing glyph metrics by 1/{}", reference_height);

        Ok(Self {
            records: std::array::from_fn(|i| glyphs[i].record().scaled(factor)),
        })
    }

    pub fn record(&self, code: GlyphCode) -> &GlyphRecord {
        &self.records[code.index()]
    }

    /// Glyph box relative to its pen position.
    pub fn bounds(&self, code: GlyphCode) -> Bounds {
        let record = self.record(code);
        Bounds {
            top_left: Point::new(0.0, record.bearing_y),
            bottom_right: Point::new(record.width, record.bearing_y - record.height),
        }
    }

    pub fn advance(&self, code: GlyphCode) -> f32 {
        self.record(code).advance
    }

    pub fn reference_height(&self) -> f32 {
        self.record(GlyphCode::REFERENCE).height
    }
}
