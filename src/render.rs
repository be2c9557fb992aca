use std::iter;
use std::sync::Arc;

use log::{ debug, info };
use pollster::FutureExt;
use wgpu::{ Adapter, Device, Instance, PresentMode, Queue, Surface, SurfaceCapabilities };
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::{ FrameError, InitError };
use crate::renderer::GlyphAtlasRenderer;

/// Window surface plus the device and queue that draw into it.
pub struct State {
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    window: Arc<Window>,
}

impl State {
    pub fn new(window: Window) -> Result<Self, InitError> {
        let window_arc = Arc::new(window);
        let size = window_arc.inner_size();
        let instance = Self::create_gpu_instance();
        let surface = instance.create_surface(window_arc.clone())?;
        let adapter = Self::create_adapter(&instance, &surface)?;
        let (device, queue) = Self::create_device(&adapter)?;
        let surface_caps = surface.get_capabilities(&adapter);
        let config = Self::create_surface_config(size, surface_caps)?;
        surface.configure(&device, &config);

        info!("using adapter {} ({:?})", adapter.get_info().name, adapter.get_info().backend);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            window: window_arc,
        })
    }

    fn create_surface_config(
        size: PhysicalSize<u32>,
        capabilities: SurfaceCapabilities
    ) -> Result<wgpu::SurfaceConfiguration, InitError> {
        let surface_format = capabilities.formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| capabilities.formats.first())
            .copied()
            .ok_or_else(|| InitError::Gpu("surface reports no texture formats".to_string()))?;
        let alpha_mode = capabilities.alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        Ok(wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        })
    }

    fn create_device(adapter: &Adapter) -> Result<(Device, Queue), InitError> {
        let device = adapter
            .request_device(
                &(wgpu::DeviceDescriptor {
                    label: Some("glyphquad"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    ..Default::default()
                })
            )
            .block_on()?;
        Ok(device)
    }

    fn create_adapter(instance: &Instance, surface: &Surface<'_>) -> Result<Adapter, InitError> {
        let adapter = instance
            .request_adapter(
                &(wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: Some(surface),
                    force_fallback_adapter: false,
                })
            )
            .block_on()?;
        Ok(adapter)
    }

    fn create_gpu_instance() -> Instance {
        Instance::new(
            &(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::PRIMARY,
                ..Default::default()
            })
        )
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;

        self.config.width = new_size.width;
        self.config.height = new_size.height;

        self.surface.configure(&self.device, &self.config);

        debug!("resized surface to {:?}", new_size);
    }

    /// Reconfigures the surface after it was lost or became outdated.
    pub fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    pub fn render(&mut self, renderer: &mut GlyphAtlasRenderer, text: &str) -> Result<usize, FrameError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        renderer.begin_frame();

        let mut encoder = self.device.create_command_encoder(
            &(wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            })
        );

        let draws = {
            let mut render_pass = encoder.begin_render_pass(
                &(wgpu::RenderPassDescriptor {
                    label: Some("Text Pass"),
                    color_attachments: &[
                        Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(renderer.config().clear_color),
                                store: wgpu::StoreOp::Store,
                            },
                        }),
                    ],
                    ..Default::default()
                })
            );

            renderer.write(&self.device, &self.queue, &mut render_pass, text)?
        };

        self.queue.submit(iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();

        Ok(draws)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}
