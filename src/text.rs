//! Text measurement and layout in the normalized glyph space.

use std::str::Chars;

use crate::config::{ Config, LayoutBox };
use crate::error::TextError;
use crate::geometry::Point;
use crate::glyph::{ GlyphCode, GlyphMetrics };

/// One glyph draw: which texture to bind and where its quad goes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphQuad {
    pub code: GlyphCode,
    /// Pen position on the baseline.
    pub origin: Point,
    pub top_left: Point,
    pub bottom_right: Point,
}

#[derive(Clone, Copy, Debug)]
pub struct TextLayout<'a> {
    metrics: &'a GlyphMetrics,
    line_spacing: f32,
    layout_box: LayoutBox,
}

impl<'a> TextLayout<'a> {
    pub fn new(metrics: &'a GlyphMetrics, config: &Config) -> Self {
        Self {
            metrics,
            line_spacing: config.line_spacing,
            layout_box: config.layout_box,
        }
    }

    /// Vertical distance between consecutive baselines, unscaled.
    pub fn line_pitch(&self) -> f32 {
        self.line_spacing * self.metrics.reference_height()
    }

    /// Widest line, measured as the sum of its advances.
    pub fn text_width(&self, text: &str) -> Result<f32, TextError> {
        let mut line_width = 0.0f32;
        let mut text_width = 0.0f32;

        for c in text.chars() {
            let code = GlyphCode::try_from(c)?;
            if code == GlyphCode::NEWLINE {
                line_width = 0.0;
                continue;
            }
            line_width += self.metrics.advance(code);
            text_width = text_width.max(line_width);
        }

        Ok(text_width)
    }

    pub fn text_height(&self, text: &str) -> Result<f32, TextError> {
        Ok((line_count(text)? as f32) * self.line_pitch())
    }

    /// Largest uniform scale at which `text` fits the layout box on both axes.
    pub fn fit_scale(&self, text: &str) -> Result<f32, TextError> {
        let vertical = self.layout_box.height() / self.text_height(text)?;
        // a zero width divides to +inf, leaving the height to decide
        let horizontal = self.layout_box.width() / self.text_width(text)?;
        Ok(vertical.min(horizontal))
    }

    /// Positions every glyph of `text`, in document order.
    ///
    /// Line breaks produce no quad. Nothing is returned for a text containing
    /// a non-ASCII character.
    pub fn layout(&self, text: &str) -> Result<Vec<GlyphQuad>, TextError> {
        let scale = self.fit_scale(text)?;
        self.quads(text, scale).collect()
    }

    pub fn quads<'t>(&self, text: &'t str, scale: f32) -> QuadIter<'t> where 'a: 't {
        QuadIter {
            chars: text.chars(),
            metrics: self.metrics,
            origin: self.layout_box.top_left(),
            line_pitch: self.line_pitch(),
            scale,
            advance: 0.0,
            line: 1,
        }
    }
}

pub fn line_count(text: &str) -> Result<usize, TextError> {
    let mut lines = 1;
    for c in text.chars() {
        if GlyphCode::try_from(c)? == GlyphCode::NEWLINE {
            lines += 1;
        }
    }
    Ok(lines)
}

#[derive(Debug)]
pub struct QuadIter<'a> {
    chars: Chars<'a>,
    metrics: &'a GlyphMetrics,
    origin: Point,
    line_pitch: f32,
    scale: f32,
    advance: f32,
    // first baseline sits one line pitch below the top border
    line: usize,
}

impl<'a> Iterator for QuadIter<'a> {
    type Item = Result<GlyphQuad, TextError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let code = match GlyphCode::try_from(self.chars.next()?) {
                Ok(code) => code,
                Err(err) => {
                    return Some(Err(err));
                }
            };

            if code == GlyphCode::NEWLINE {
                self.line += 1;
                self.advance = 0.0;
                continue;
            }

            let pen =
                self.origin +
                self.scale * Point::new(self.advance, -self.line_pitch * (self.line as f32));
            self.advance += self.metrics.advance(code);

            let bounds = self.metrics.bounds(code);
            return Some(
                Ok(GlyphQuad {
                    code,
                    origin: pen,
                    top_left: pen + self.scale * bounds.top_left,
                    bottom_right: pen + self.scale * bounds.bottom_right,
                })
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::testing::fixed_metrics;

    const EPSILON: f32 = 1e-5;

    fn code(c: char) -> GlyphCode {
        GlyphCode::try_from(c).unwrap()
    }

    #[test]
    fn test_empty_text_measurement() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        assert_eq!(layout.text_width("").unwrap(), 0.0);
        assert!((layout.text_height("").unwrap() - 1.5 * metrics.reference_height()).abs() < EPSILON);
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count("").unwrap(), 1);
        assert_eq!(line_count("abc").unwrap(), 1);
        assert_eq!(line_count("a\nb").unwrap(), 2);
        assert_eq!(line_count("a\n\nb\nc").unwrap(), 4);
        assert_eq!(line_count("trailing\n").unwrap(), 2);
    }

    #[test]
    fn test_text_width_takes_widest_line() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        let ab = metrics.advance(code('a')) + metrics.advance(code('b'));
        let xyz = metrics.advance(code('x')) + metrics.advance(code('y')) + metrics.advance(code('z'));

        let width = layout.text_width("ab\nxyz\nb").unwrap();
        assert!((width - ab.max(xyz)).abs() < EPSILON);
    }

    #[test]
    fn test_text_height_depends_only_on_line_count() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        let height = layout.text_height("Hello\nWorld").unwrap();
        assert_eq!(layout.text_height("olleH\ndlroW").unwrap(), height);
        assert_eq!(layout.text_height("lHleo\nWrdlo").unwrap(), height);
        assert!((height - 2.0 * layout.line_pitch()).abs() < EPSILON);
    }

    #[test]
    fn test_invalid_character_rejected() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        assert_eq!(layout.text_width("caf\u{e9}"), Err(TextError::InvalidCharacter('\u{e9}')));
        assert_eq!(layout.text_height("na\u{ef}ve"), Err(TextError::InvalidCharacter('\u{ef}')));
        assert_eq!(layout.layout("ok\n\u{2603}"), Err(TextError::InvalidCharacter('\u{2603}')));
    }

    #[test]
    fn test_fit_scale_keeps_text_inside_box() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);
        let layout_box = config.layout_box;

        for text in ["Hi", "a much longer single line of text", "a\nb\nc\nd\ne\nf\ng", "", "\n\n", "   "] {
            let scale = layout.fit_scale(text).unwrap();
            assert!(scale.is_finite(), "{:?}", text);
            assert!(scale * layout.text_height(text).unwrap() <= layout_box.height() + EPSILON);
            assert!(scale * layout.text_width(text).unwrap() <= layout_box.width() + EPSILON);
        }
    }

    #[test]
    fn test_hi_scenario() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        let quads = layout.layout("Hi").unwrap();
        let scale = layout.fit_scale("Hi").unwrap();

        assert_eq!(quads.len(), 2);
        assert_eq!(quads[0].code, code('H'));
        assert_eq!(quads[1].code, code('i'));
        assert!((quads[0].origin.x - config.layout_box.left).abs() < EPSILON);

        let offset = quads[1].origin.x - quads[0].origin.x;
        assert!((offset - scale * metrics.advance(code('H'))).abs() < EPSILON);
    }

    #[test]
    fn test_quad_corners_follow_bounds() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        let scale = layout.fit_scale("g").unwrap();
        let quad = layout.layout("g").unwrap()[0];
        let bounds = metrics.bounds(code('g'));

        let expected_origin = Point::new(-0.9, 0.9 - scale * layout.line_pitch());
        assert!((quad.origin.x - expected_origin.x).abs() < EPSILON);
        assert!((quad.origin.y - expected_origin.y).abs() < EPSILON);
        assert!((quad.top_left.y - (quad.origin.y + scale * bounds.top_left.y)).abs() < EPSILON);
        assert!((quad.bottom_right.x - (quad.origin.x + scale * bounds.bottom_right.x)).abs() < EPSILON);
        assert!((quad.bottom_right.y - (quad.origin.y + scale * bounds.bottom_right.y)).abs() < EPSILON);
    }

    #[test]
    fn test_newline_resets_pen_and_moves_down() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        let scale = layout.fit_scale("ab\ncd").unwrap();
        let quads = layout.layout("ab\ncd").unwrap();

        assert_eq!(quads.len(), 4);
        assert_eq!(quads[2].code, code('c'));
        assert!((quads[2].origin.x - quads[0].origin.x).abs() < EPSILON);
        let drop = quads[0].origin.y - quads[2].origin.y;
        assert!((drop - scale * layout.line_pitch()).abs() < EPSILON);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        let text = "The quick brown fox\njumps over\nthe lazy dog.";
        assert_eq!(layout.layout(text).unwrap(), layout.layout(text).unwrap());
    }

    #[test]
    fn test_layout_skips_only_newlines() {
        let metrics = fixed_metrics();
        let config = Config::default();
        let layout = TextLayout::new(&metrics, &config);

        assert!(layout.layout("").unwrap().is_empty());
        assert!(layout.layout("\n\n").unwrap().is_empty());
        assert_eq!(layout.layout("a b\tc").unwrap().len(), 5);
    }
}
