mod device;

#[cfg(debug_assertions)]
use crate::vk_debug::vulkan_debug_callback;
use crate::vk_pipelines::{load_shader_module, shader_path, PipelineBuilder};
use crate::vk_types::{
    CommandTable, DeviceContext, EngineError, InstanceContext, QueueFamilies, SwapchainBundle, TrianglePipeline,
};
use crate::vk_init;
use anyhow::{Context, Result};
#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain};
use ash::vk::Handle;
use ash::{vk, Device, Entry, Instance};
use sdl2::sys::VkInstance;
use sdl2::video::Window;
#[cfg(debug_assertions)]
use std::ffi::CStr;
use std::ffi::{c_char, CString};
use std::path::Path;
use std::slice;

#[cfg(debug_assertions)]
const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

//-----------------------------INSTANCE-------------------------------
pub fn create_instance(entry: &Entry, window: &Window) -> Result<Instance> {
    let application_name = CString::new("sdl_vulkan_triangle")?;
    let engine_name = CString::new("No Engine")?;
    let app_info = vk::ApplicationInfo::builder()
        .application_name(application_name.as_c_str())
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name.as_c_str())
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::make_api_version(0, 1, 1, 0))
        .build();

    // SDL hands back the surface extensions for whatever video driver it picked
    let window_extensions = window
        .vulkan_instance_extensions()
        .map_err(EngineError::Sdl)
        .context("querying SDL vulkan instance extensions")?
        .into_iter()
        .map(CString::new)
        .collect::<Result<Vec<CString>, _>>()?;
    #[allow(unused_mut)]
    let mut extension_names: Vec<*const c_char> = window_extensions.iter().map(|name| name.as_ptr()).collect();
    #[cfg(debug_assertions)]
    extension_names.push(DebugUtils::name().as_ptr());
    log::debug!("instance extensions: {:?}", window_extensions);

    #[allow(unused_mut)]
    let mut layer_names: Vec<*const c_char> = Vec::new();
    cfg_if::cfg_if! {
        if #[cfg(debug_assertions)] {
            if validation_layer_available(entry)? {
                layer_names.push(VALIDATION_LAYER.as_ptr());
            } else {
                log::warn!("{} not installed, running without validation", VALIDATION_LAYER.to_string_lossy());
            }
        }
    }

    let instance_create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .build();
    unsafe { entry.create_instance(&instance_create_info, None) }.context("creating vulkan instance")
}

#[cfg(debug_assertions)]
fn validation_layer_available(entry: &Entry) -> Result<bool> {
    let layer_properties = entry.enumerate_instance_layer_properties()?;
    Ok(layer_properties.iter().any(|lp| {
        let name = unsafe { CStr::from_ptr(lp.layer_name.as_ptr()) };
        name == VALIDATION_LAYER
    }))
}

//---------------------------------------DEBUG-----------------------------------------
#[cfg(debug_assertions)]
pub fn create_debug_messenger(debug_utils_loader: &DebugUtils) -> Result<vk::DebugUtilsMessengerEXT> {
    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
        .build();

    unsafe { debug_utils_loader.create_debug_utils_messenger(&debug_info, None) }
        .context("creating debug messenger")
}

//----------------------------DEVICE------------------------------------
pub fn create_device(
    instance: &Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
) -> Result<(Device, vk::PhysicalDevice, QueueFamilies)> {
    let (physical_device, queue_families) =
        device::pick_physical_device_and_queues(instance, surface_loader, surface)?;
    let priorities = [1.0];
    let mut unique_families = vec![queue_families.graphics];
    if !queue_families.is_shared() {
        unique_families.push(queue_families.present);
    }
    let queue_info: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&priorities)
                .build()
        })
        .collect();

    let device_extension_names = [Swapchain::name().as_ptr()];

    let device_create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_info)
        .enabled_extension_names(&device_extension_names)
        .build();
    let device: Device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
        .context("creating logical device")?;

    Ok((device, physical_device, queue_families))
}

/// Loader, instance, debug messenger and window surface. The owner exists before any
/// of its children, so an error partway through releases whatever was created.
pub fn init_instance_context(window: &Window) -> Result<InstanceContext> {
    let entry = Entry::linked();
    let instance = create_instance(&entry, window)?;
    let mut context = InstanceContext {
        #[cfg(debug_assertions)]
        debug_utils_loader: DebugUtils::new(&entry, &instance),
        #[cfg(debug_assertions)]
        debug_messenger: vk::DebugUtilsMessengerEXT::null(),
        surface_loader: Surface::new(&entry, &instance),
        surface: vk::SurfaceKHR::null(),
        instance,
        _entry: entry,
    };
    //Debug Utils initialization
    #[cfg(debug_assertions)]
    {
        context.debug_messenger = create_debug_messenger(&context.debug_utils_loader)?;
    }
    //Surface initialization
    let instance_handle = context.instance.handle().as_raw();
    context.surface = vk::SurfaceKHR::from_raw(
        window
            .vulkan_create_surface(instance_handle as VkInstance)
            .map_err(EngineError::Sdl)
            .context("creating window surface")?,
    );
    Ok(context)
}

/// Instance, surface and device for `window`, in that order.
pub fn init_context(window: &Window) -> Result<DeviceContext> {
    let instance_context = init_instance_context(window)?;
    let (device, physical_device, queue_families) = create_device(
        &instance_context.instance,
        &instance_context.surface_loader,
        instance_context.surface,
    )?;
    let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
    let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

    Ok(DeviceContext {
        device,
        physical_device,
        queue_families,
        graphics_queue,
        present_queue,
        instance_context,
    })
}

//-------------------SWAPCHAIN-----------------------
/// `min + 1`, clamped to `max` when the surface has one (0 means no limit).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired_image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && desired_image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        desired_image_count
    }
}

pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    match capabilities.current_extent.width {
        // the surface size is determined by the swapchain
        u32::MAX => vk::Extent2D {
            width: window_extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: window_extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        },
        _ => capabilities.current_extent,
    }
}

pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

// FIFO is the only mode every implementation has to support
pub fn choose_present_mode(available: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

pub fn create_swapchain(
    context: &DeviceContext,
    window_extent: vk::Extent2D,
    preferred_present_mode: vk::PresentModeKHR,
) -> Result<SwapchainBundle> {
    let surface_loader = &context.instance_context.surface_loader;
    let (physical_device, surface) = (context.physical_device, context.instance_context.surface);
    let surface_capabilities = unsafe {
        surface_loader.get_physical_device_surface_capabilities(physical_device, surface)
    }
    .context("querying surface capabilities")?;
    let formats = unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface) }
        .context("querying surface formats")?;
    let present_modes = unsafe {
        surface_loader.get_physical_device_surface_present_modes(physical_device, surface)
    }
    .context("querying present modes")?;

    let surface_format = choose_surface_format(&formats).context("surface reports no formats")?;
    let desired_image_count = choose_image_count(&surface_capabilities);
    let surface_extent = choose_extent(&surface_capabilities, window_extent);
    let present_mode = choose_present_mode(&present_modes, preferred_present_mode);
    if present_mode != preferred_present_mode {
        log::warn!("present mode {:?} unsupported, using {:?}", preferred_present_mode, present_mode);
    }
    let pre_transform = if surface_capabilities
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        surface_capabilities.current_transform
    };

    let families = context.queue_families;
    let family_indices = [families.graphics, families.present];
    let (sharing_mode, shared_families): (vk::SharingMode, &[u32]) = if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, &[])
    } else {
        (vk::SharingMode::CONCURRENT, &family_indices)
    };

    let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .present_mode(present_mode)
        .image_extent(surface_extent)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .min_image_count(desired_image_count)
        .image_sharing_mode(sharing_mode)
        .queue_family_indices(shared_families)
        .pre_transform(pre_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .clipped(true)
        .image_array_layers(1)
        .build();

    let swapchain_loader = Swapchain::new(&context.instance_context.instance, &context.device);
    let swapchain = unsafe { swapchain_loader.create_swapchain(&swapchain_create_info, None) }
        .context("creating swapchain")?;
    let mut bundle = SwapchainBundle {
        device: context.device.clone(),
        loader: swapchain_loader,
        swapchain,
        format: surface_format,
        extent: surface_extent,
        images: Vec::new(),
        image_views: Vec::new(),
        framebuffers: Vec::new(),
    };
    bundle.images = unsafe { bundle.loader.get_swapchain_images(swapchain) }
        .context("fetching swapchain images")?;
    for &image in bundle.images.iter() {
        let create_view_info =
            vk_init::image_view_create_info(surface_format.format, image, vk::ImageAspectFlags::COLOR);
        let view = unsafe { context.device.create_image_view(&create_view_info, None) }
            .context("creating swapchain image view")?;
        bundle.image_views.push(view);
    }
    log::info!(
        "swapchain: {} images, {}x{}, {:?}, {:?}",
        bundle.images.len(),
        surface_extent.width,
        surface_extent.height,
        surface_format.format,
        present_mode
    );
    Ok(bundle)
}

pub fn create_framebuffers(bundle: &mut SwapchainBundle, render_pass: vk::RenderPass) -> Result<()> {
    for index in 0..bundle.image_views.len() {
        let attachments = [bundle.image_views[index]];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(bundle.extent.width)
            .height(bundle.extent.height)
            .layers(1)
            .build();
        let framebuffer = unsafe { bundle.device.create_framebuffer(&framebuffer_info, None) }
            .context("creating framebuffer")?;
        bundle.framebuffers.push(framebuffer);
    }
    Ok(())
}

//-------------------RENDER PASS & PIPELINE-----------------------
pub fn create_render_pass(device: &Device, format: vk::Format) -> Result<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(slice::from_ref(&color_attachment_ref))
        .build();

    // the layout transition must wait for the image-available semaphore, which
    // the submit waits on at COLOR_ATTACHMENT_OUTPUT
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build();

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(slice::from_ref(&color_attachment))
        .subpasses(slice::from_ref(&subpass))
        .dependencies(slice::from_ref(&dependency))
        .build();

    unsafe { device.create_render_pass(&render_pass_info, None) }.context("creating render pass")
}

pub fn init_triangle_pipeline(device: &Device, format: vk::Format, shader_dir: &Path) -> Result<TrianglePipeline> {
    let mut triangle = TrianglePipeline {
        device: device.clone(),
        render_pass: vk::RenderPass::null(),
        layout: vk::PipelineLayout::null(),
        pipeline: vk::Pipeline::null(),
    };
    triangle.render_pass = create_render_pass(device, format)?;

    //no descriptors, no push constants
    let pipeline_layout_info = vk::PipelineLayoutCreateInfo::builder().build();
    triangle.layout = unsafe { device.create_pipeline_layout(&pipeline_layout_info, None) }
        .context("creating pipeline layout")?;

    let triangle_vertex_shader = load_shader_module(&shader_path(shader_dir, "triangle.vert"), device)?;
    let triangle_frag_shader = match load_shader_module(&shader_path(shader_dir, "triangle.frag"), device) {
        Ok(module) => module,
        Err(e) => {
            unsafe { device.destroy_shader_module(triangle_vertex_shader, None) };
            return Err(e.into());
        }
    };

    let mut pipeline_builder = PipelineBuilder::default();
    pipeline_builder.pipeline_layout = triangle.layout;
    pipeline_builder.render_pass = triangle.render_pass;
    //connecting the vertex and pixel shaders to the pipeline
    let shader_entry_name = CString::new("main")?;
    pipeline_builder.set_shaders(
        triangle_vertex_shader,
        triangle_frag_shader,
        &shader_entry_name,
        &shader_entry_name,
    );
    //it will draw triangles
    pipeline_builder.set_input_topology(vk::PrimitiveTopology::TRIANGLE_LIST);
    //filled triangles
    pipeline_builder.set_polygon_mode(vk::PolygonMode::FILL);
    //no backface culling
    pipeline_builder.set_cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::CLOCKWISE);
    //no multisampling
    pipeline_builder.set_multisampling_none();
    pipeline_builder.disable_blending();

    let pipeline = pipeline_builder.build_pipeline(device);

    //clean structures
    unsafe {
        device.destroy_shader_module(triangle_frag_shader, None);
        device.destroy_shader_module(triangle_vertex_shader, None);
    }
    triangle.pipeline = pipeline?;
    Ok(triangle)
}

//-------------------COMMANDS-----------------------
/// Allocates one command buffer per framebuffer and records the triangle draw into each.
pub fn init_commands(
    device: &Device,
    graphics_queue_family: u32,
    swapchain: &SwapchainBundle,
    triangle: &TrianglePipeline,
    clear_color: [f32; 4],
) -> Result<CommandTable> {
    let command_pool_info = vk_init::command_pool_create_info(
        graphics_queue_family,
        vk::CommandPoolCreateFlags::empty(),
    );
    let mut table = CommandTable {
        device: device.clone(),
        command_pool: vk::CommandPool::null(),
        command_buffers: Vec::new(),
    };
    table.command_pool = unsafe { device.create_command_pool(&command_pool_info, None) }
        .context("creating command pool")?;
    let cmd_alloc_info =
        vk_init::command_buffer_allocate_info(table.command_pool, swapchain.framebuffers.len() as u32);
    table.command_buffers = unsafe { device.allocate_command_buffers(&cmd_alloc_info) }
        .context("allocating command buffers")?;

    for (&cmd, &framebuffer) in table.command_buffers.iter().zip(swapchain.framebuffers.iter()) {
        record_triangle(device, cmd, framebuffer, swapchain.extent, triangle, clear_color)?;
    }
    log::debug!("recorded {} command buffers", table.command_buffers.len());
    Ok(table)
}

fn record_triangle(
    device: &Device,
    cmd: vk::CommandBuffer,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    triangle: &TrianglePipeline,
    clear_color: [f32; 4],
) -> Result<()> {
    // the same buffer may be resubmitted for its image while a previous submission is pending
    let cmd_begin_info = vk_init::command_buffer_begin_info(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);
    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue { float32: clear_color },
    }];
    let render_pass_info =
        vk_init::render_pass_begin_info(triangle.render_pass, framebuffer, extent, &clear_values);
    let viewport = vk_init::full_viewport(extent);
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    unsafe {
        device.begin_command_buffer(cmd, &cmd_begin_info).context("begin_command_buffer")?;
        device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, triangle.pipeline);
        device.cmd_set_viewport(cmd, 0, slice::from_ref(&viewport));
        device.cmd_set_scissor(cmd, 0, slice::from_ref(&scissor));
        //vertices come from gl_VertexIndex
        device.cmd_draw(cmd, 3, 1, 0, 0);
        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd).context("end_command_buffer")?;
    }
    Ok(())
}
