use std::path::PathBuf;

use crate::geometry::Point;

pub const FONT_PATH: &str = "fonts/arial.ttf";
/// Environment variable overriding the font file.
pub const FONT_ENV: &str = "GLYPHQUAD_FONT";
const PIXEL_SIZE: f32 = 48.0;
const LINE_SPACING: f32 = 1.5;
const BORDER: f32 = 0.9;

/// Region of clip space the text is scaled to fit into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBox {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl LayoutBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }
}

impl Default for LayoutBox {
    fn default() -> Self {
        Self {
            top: BORDER,
            bottom: -BORDER,
            left: -BORDER,
            right: BORDER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub font_path: PathBuf,
    pub pixel_size: f32,
    pub line_spacing: f32,
    pub layout_box: LayoutBox,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub clear_color: wgpu::Color,
}

impl Config {
    /// Defaults, with the font path taken from `GLYPHQUAD_FONT` when set.
    pub fn from_env() -> Self {
        match std::env::var_os(FONT_ENV) {
            Some(path) if !path.is_empty() => Self::default().with_font_path(path),
            _ => Self::default(),
        }
    }

    pub fn with_font_path(mut self, font_path: impl Into<PathBuf>) -> Self {
        self.font_path = font_path.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from(FONT_PATH),
            pixel_size: PIXEL_SIZE,
            line_spacing: LINE_SPACING,
            layout_box: LayoutBox::default(),
            vertex_shader: PathBuf::from("shaders/text_vs.wgsl"),
            fragment_shader: PathBuf::from("shaders/text_fs.wgsl"),
            clear_color: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
        }
    }
}
