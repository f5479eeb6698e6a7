use crate::vk_check;
use crate::vk_engine::frame_data::FrameSync;
use crate::vk_engine::presentation::{AcquiredImage, PresentationDevice};
use crate::vk_init;
use crate::vk_types::EngineError;
use ash::extensions::khr::Swapchain;
use ash::{vk, Device};
use std::slice;

/// Borrowed view of the engine's queues and swapchain, rebuilt for every frame.
pub struct GpuPresenter<'a> {
    pub device: &'a Device,
    pub swapchain_loader: &'a Swapchain,
    pub swapchain: vk::SwapchainKHR,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub command_buffers: &'a [vk::CommandBuffer],
}

impl<'a> PresentationDevice for GpuPresenter<'a> {
    type FrameSync = FrameSync;

    fn image_count(&self) -> u32 {
        self.command_buffers.len() as u32
    }

    fn wait_for_fence(&mut self, frame: &FrameSync) -> Result<(), EngineError> {
        vk_check!(
            unsafe { self.device.wait_for_fences(slice::from_ref(&frame.render_fence), true, u64::MAX) },
            "wait_for_fences"
        )
    }

    fn reset_fence(&mut self, frame: &FrameSync) -> Result<(), EngineError> {
        vk_check!(
            unsafe { self.device.reset_fences(slice::from_ref(&frame.render_fence)) },
            "reset_fences"
        )
    }

    fn acquire_next_image(&mut self, frame: &FrameSync) -> Result<AcquiredImage, EngineError> {
        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                frame.swapchain_semaphore,
                vk::Fence::null(),
            )
        };
        match acquired {
            Ok((index, suboptimal)) => Ok(AcquiredImage { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(EngineError::SwapchainOutOfDate),
            Err(result) => Err(EngineError::Vulkan {
                context: "acquire_next_image",
                result,
            }),
        }
    }

    fn submit(
        &mut self,
        image_index: u32,
        wait_image_available: &FrameSync,
        signal_render_finished: &FrameSync,
        fence: &FrameSync,
    ) -> Result<(), EngineError> {
        let cmd = *self
            .command_buffers
            .get(image_index as usize)
            .ok_or(EngineError::ImageIndexOutOfRange {
                index: image_index,
                image_count: self.image_count(),
            })?;
        let command_buffers = [cmd];
        let wait_semaphores = [wait_image_available.swapchain_semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [signal_render_finished.render_semaphore];
        let submit_info =
            vk_init::submit_info(&command_buffers, &wait_semaphores, &wait_stages, &signal_semaphores);

        vk_check!(
            unsafe {
                self.device.queue_submit(
                    self.graphics_queue,
                    slice::from_ref(&submit_info),
                    fence.render_fence,
                )
            },
            "queue_submit"
        )
    }

    fn present(&mut self, image_index: u32, wait_render_finished: &FrameSync) -> Result<bool, EngineError> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_render_finished.render_semaphore];
        let present_info = vk_init::present_info(&swapchains, &image_indices, &wait_semaphores);

        match unsafe { self.swapchain_loader.queue_present(self.present_queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(EngineError::SwapchainOutOfDate),
            Err(result) => Err(EngineError::Vulkan {
                context: "queue_present",
                result,
            }),
        }
    }
}
