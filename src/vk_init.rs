use ash::vk;

pub fn command_pool_create_info(queue_family_index : u32, flags : vk::CommandPoolCreateFlags) -> vk::CommandPoolCreateInfo {
    vk::CommandPoolCreateInfo::builder()
        .flags(flags)
        .queue_family_index(queue_family_index)
        .build()
}

pub fn command_buffer_allocate_info(pool : vk::CommandPool, count : u32) -> vk::CommandBufferAllocateInfo {
    vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool)
        .command_buffer_count(count)
        .level(vk::CommandBufferLevel::PRIMARY)
        .build()
}

pub fn fence_create_info(flags : vk::FenceCreateFlags) -> vk::FenceCreateInfo {
    vk::FenceCreateInfo::builder()
        .flags(flags)
        .build()
}

pub fn semaphore_create_info(flags : vk::SemaphoreCreateFlags) -> vk::SemaphoreCreateInfo {
    vk::SemaphoreCreateInfo::builder()
        .flags(flags)
        .build()
}

pub fn command_buffer_begin_info(flags : vk::CommandBufferUsageFlags) -> vk::CommandBufferBeginInfo {
    vk::CommandBufferBeginInfo::builder()
        .flags(flags)
        .build()
}

pub fn image_subresource_range(aspect_mask : vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::builder()
        .aspect_mask(aspect_mask)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
        .build()
}

pub fn image_view_create_info(format : vk::Format, image : vk::Image, aspect_flags : vk::ImageAspectFlags) -> vk::ImageViewCreateInfo {
    vk::ImageViewCreateInfo::builder()
        .view_type(vk::ImageViewType::TYPE_2D)
        .image(image)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(image_subresource_range(aspect_flags))
        .build()
}

// the returned structs point into the slices, keep them alive until the call that consumes it

pub fn render_pass_begin_info(render_pass : vk::RenderPass, framebuffer : vk::Framebuffer, extent : vk::Extent2D, clear_values : &[vk::ClearValue]) -> vk::RenderPassBeginInfo {
    vk::RenderPassBeginInfo::builder()
        .render_pass(render_pass)
        .framebuffer(framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        })
        .clear_values(clear_values)
        .build()
}

pub fn submit_info(command_buffers : &[vk::CommandBuffer], wait_semaphores : &[vk::Semaphore], wait_stages : &[vk::PipelineStageFlags], signal_semaphores : &[vk::Semaphore]) -> vk::SubmitInfo {
    vk::SubmitInfo::builder()
        .wait_semaphores(wait_semaphores)
        .wait_dst_stage_mask(wait_stages)
        .command_buffers(command_buffers)
        .signal_semaphores(signal_semaphores)
        .build()
}

pub fn present_info(swapchains : &[vk::SwapchainKHR], image_indices : &[u32], wait_semaphores : &[vk::Semaphore]) -> vk::PresentInfoKHR {
    vk::PresentInfoKHR::builder()
        .wait_semaphores(wait_semaphores)
        .swapchains(swapchains)
        .image_indices(image_indices)
        .build()
}

pub fn full_viewport(extent : vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0f32,
        y: 0f32,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0f32,
        max_depth: 1f32,
    }
}
