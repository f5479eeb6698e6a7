use crate::vk_engine::frame_data::FrameSync;
use crate::vk_types::{CommandTable, DeviceContext, InstanceContext, SwapchainBundle, TrianglePipeline};

// Each owner releases only its own handles. VulkanEngine declares its fields so that
// children drop before DeviceContext, which goes last and takes InstanceContext with it.

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.render_fence, None);
            self.device.destroy_semaphore(self.render_semaphore, None);
            self.device.destroy_semaphore(self.swapchain_semaphore, None);
        }
    }
}

impl Drop for CommandTable {
    fn drop(&mut self) {
        // frees the command buffers with it
        unsafe { self.device.destroy_command_pool(self.command_pool, None) };
    }
}

impl Drop for SwapchainBundle {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in self.framebuffers.iter() {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            for &view in self.image_views.iter() {
                self.device.destroy_image_view(view, None);
            }
            //the images themselves belong to the swapchain
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

impl Drop for TrianglePipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        // VulkanEngine waits for idle before any field drops
        unsafe { self.device.destroy_device(None) };
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
            #[cfg(debug_assertions)]
            self.debug_utils_loader
                .destroy_debug_utils_messenger(self.debug_messenger, None);
            self.instance.destroy_instance(None);
        }
        log::debug!("vulkan context destroyed");
    }
}
