mod destructors;
pub mod frame_data;
pub mod frame_ring;
pub mod gpu_presenter;
pub mod presentation;
#[cfg(test)]
mod simulated;

use crate::config::EngineConfig;
use crate::vk_bootstrap;
use crate::vk_types::{CommandTable, DeviceContext, EngineError, SwapchainBundle, TrianglePipeline};
use anyhow::{Context, Result};
use ash::vk;
use frame_data::FrameSync;
use frame_ring::FrameRing;
use gpu_presenter::GpuPresenter;
use presentation::PresentationCycle;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::EventPump;

// Fields drop top to bottom: everything created from the device goes before `context`,
// and the surface inside `context` goes before the window it was made from.
pub struct VulkanEngine {
    pub cycle: PresentationCycle<FrameSync>,
    pub commands: CommandTable,
    pub swapchain: SwapchainBundle,
    pub triangle: TrianglePipeline,
    pub context: DeviceContext,
    pub frame_number: u64,
    pub stop_rendering: bool,
    pub config: EngineConfig,
    pub event_pump: EventPump,
    pub window: sdl2::video::Window,
    _sdl_context: sdl2::Sdl,
}

// Main loop functions
impl VulkanEngine {
    pub fn init(config: EngineConfig) -> Result<Self> {
        let window_extent = vk::Extent2D {
            width: config.window_width,
            height: config.window_height,
        };
        //SDL initialization
        let sdl_context = sdl2::init().map_err(EngineError::Sdl).context("initializing SDL")?;
        let video_subsystem = sdl_context.video().map_err(EngineError::Sdl).context("initializing SDL video")?;
        let window = video_subsystem
            .window(&config.window_title, window_extent.width, window_extent.height)
            .position_centered()
            .vulkan()
            .build()
            .map_err(|e| EngineError::Sdl(e.to_string()))
            .context("creating vulkan window")?;
        let event_pump = sdl_context.event_pump().map_err(EngineError::Sdl)?;

        //Vulkan initialization
        let context = vk_bootstrap::init_context(&window)?;
        let mut swapchain = vk_bootstrap::create_swapchain(&context, window_extent, config.present_mode)?;
        let triangle = vk_bootstrap::init_triangle_pipeline(&context.device, swapchain.format.format, &config.shader_dir)?;
        vk_bootstrap::create_framebuffers(&mut swapchain, triangle.render_pass)?;
        let commands = vk_bootstrap::init_commands(
            &context.device,
            context.queue_families.graphics,
            &swapchain,
            &triangle,
            config.clear_color,
        )?;

        //one frame slot per swapchain image
        let frames = frame_data::init_frames(&context.device, swapchain.images.len())?;
        let cycle = PresentationCycle::new(
            FrameRing::new(frames)?,
            swapchain.image_count(),
            config.render_finished_indexing,
        )?;
        log::info!(
            "engine ready: {} frames in flight, render-finished indexing {:?}",
            cycle.frames().capacity(),
            config.render_finished_indexing
        );

        Ok(VulkanEngine {
            cycle,
            commands,
            swapchain,
            triangle,
            context,
            frame_number: 0,
            stop_rendering: false,
            config,
            event_pump,
            window,
            _sdl_context: sdl_context,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut b_quit = false;
        // main loop
        while !b_quit {
            // Handle events on queue
            for event in self.event_pump.poll_iter() {
                match event {
                    Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape),
                        ..
                    } => {
                        b_quit = true;
                    }
                    Event::Window { win_event, .. } => {
                        match win_event {
                            WindowEvent::Minimized => self.stop_rendering = true,
                            WindowEvent::Restored => self.stop_rendering = false,
                            _ => {}
                        };
                    }
                    _ => {}
                };
            }
            //do not draw if we are minimized
            if self.stop_rendering {
                std::thread::sleep(std::time::Duration::from_millis(10));
                continue;
            }
            self.draw()?;
            if self.config.max_frames.map_or(false, |max| self.frame_number >= max) {
                log::info!("rendered {} frames, stopping", self.frame_number);
                b_quit = true;
            }
        }
        Ok(())
    }

    pub fn draw(&mut self) -> Result<(), EngineError> {
        let mut presenter = GpuPresenter {
            device: &self.context.device,
            swapchain_loader: &self.swapchain.loader,
            swapchain: self.swapchain.swapchain,
            graphics_queue: self.context.graphics_queue,
            present_queue: self.context.present_queue,
            command_buffers: &self.commands.command_buffers,
        };
        let report = self.cycle.run_cycle(&mut presenter)?;
        log::trace!(
            "frame {} slot {} image {}",
            self.frame_number,
            report.frame_slot,
            report.image_index
        );
        self.frame_number += 1;
        Ok(())
    }
}

impl Drop for VulkanEngine {
    fn drop(&mut self) {
        // nothing may still be in flight when the fields start releasing handles
        if let Err(e) = unsafe { self.context.device.device_wait_idle() } {
            log::error!("device_wait_idle failed before teardown: {e}");
        }
    }
}
