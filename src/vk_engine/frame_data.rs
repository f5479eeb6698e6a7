use crate::vk_check;
use crate::vk_init;
use crate::vk_types::EngineError;
use ash::{vk, Device};

/// Synchronization objects owned by one in-flight frame slot.
pub struct FrameSync {
    pub device: Device,
    // signaled by the GPU once the slot's last submission has finished
    pub render_fence: vk::Fence,
    // image-available: acquire -> submit
    pub swapchain_semaphore: vk::Semaphore,
    // render-finished: submit -> present
    pub render_semaphore: vk::Semaphore,
}

impl FrameSync {
    pub fn new(device: &Device) -> Result<Self, EngineError> {
        //fences start signaled so the first wait on every slot returns at once
        let fence_create_info = vk_init::fence_create_info(vk::FenceCreateFlags::SIGNALED);
        let semaphore_create_info = vk_init::semaphore_create_info(vk::SemaphoreCreateFlags::empty());

        let mut sync = FrameSync {
            device: device.clone(),
            render_fence: vk::Fence::null(),
            swapchain_semaphore: vk::Semaphore::null(),
            render_semaphore: vk::Semaphore::null(),
        };
        // filled in one handle at a time so a failure still releases what was created
        sync.render_fence = vk_check!(
            unsafe { device.create_fence(&fence_create_info, None) },
            "create_fence"
        )?;
        sync.swapchain_semaphore = vk_check!(
            unsafe { device.create_semaphore(&semaphore_create_info, None) },
            "create_semaphore"
        )?;
        sync.render_semaphore = vk_check!(
            unsafe { device.create_semaphore(&semaphore_create_info, None) },
            "create_semaphore"
        )?;
        Ok(sync)
    }
}

pub fn init_frames(device: &Device, count: usize) -> Result<Vec<FrameSync>, EngineError> {
    (0..count).map(|_| FrameSync::new(device)).collect()
}
