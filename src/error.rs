//! Error types for renderer construction and text layout.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal failure while building the renderer or its GPU state.
///
/// Construction is all-or-nothing: any of these aborts it and nothing
/// partially built is kept around.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("failed to load font {path}: {reason}")]
    FontLoad { path: PathBuf, reason: String },

    #[error("reference glyph has unusable height {0}")]
    DegenerateReference(f32),

    #[error("failed to read shader source {path}: {source}")]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to compile shader {path}: {message}")]
    ShaderCompile { path: PathBuf, message: String },

    #[error("failed to link {vertex} with {fragment}: {message}")]
    Pipeline { vertex: PathBuf, fragment: PathBuf, message: String },

    #[error("gpu allocation failed: {0}")]
    Gpu(String),

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable gpu adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to open gpu device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextError {
    #[error("character {0:?} is outside the ASCII range")]
    InvalidCharacter(char),

    #[error("text has {glyphs} glyphs, at most {max} fit in one instance buffer")]
    TooManyGlyphs { glyphs: usize, max: usize },
}

/// Failure while producing one frame.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),

    #[error(transparent)]
    Text(#[from] TextError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_names_both_shaders() {
        let err = InitError::Pipeline {
            vertex: PathBuf::from("shaders/text_vs.wgsl"),
            fragment: PathBuf::from("shaders/text_fs.wgsl"),
            message: "location mismatch".to_string(),
        };
        let message = err.to_string();

        assert!(message.contains("shaders/text_vs.wgsl"));
        assert!(message.contains("shaders/text_fs.wgsl"));
        assert!(message.contains("location mismatch"));
    }

    #[test]
    fn test_too_many_glyphs_message() {
        let err = TextError::TooManyGlyphs { glyphs: 20, max: 16 };
        assert_eq!(err.to_string(), "text has 20 glyphs, at most 16 fit in one instance buffer");
    }
}
