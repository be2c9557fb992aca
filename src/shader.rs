//! Loading WGSL sources from disk and compiling them into shader modules.

use std::fs;
use std::path::Path;

use log::debug;
use pollster::FutureExt;

use crate::error::InitError;

pub fn read_source(path: &Path) -> Result<String, InitError> {
    fs::read_to_string(path).map_err(|source| InitError::ShaderSource {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and compiles the shader at `path`, reporting validation errors
/// instead of leaving them to the device's uncaptured error handler.
pub fn compile(device: &wgpu::Device, path: &Path) -> Result<wgpu::ShaderModule, InitError> {
    let source = read_source(path)?;
    let label = path.display().to_string();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label.as_str()),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    if let Some(err) = device.pop_error_scope().block_on() {
        return Err(InitError::ShaderCompile {
            path: path.to_path_buf(),
            message: err.to_string(),
        });
    }

    debug!("compiled shader {}", label);
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_source() {
        let path = Path::new("shaders/missing.wgsl");
        match read_source(path) {
            Err(InitError::ShaderSource { path: reported, source }) => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_bundled_sources_present() {
        let vertex = read_source(Path::new("shaders/text_vs.wgsl")).unwrap();
        let fragment = read_source(Path::new("shaders/text_fs.wgsl")).unwrap();

        assert!(vertex.contains("fn vs_main"));
        assert!(fragment.contains("fn fs_main"));
    }
}
