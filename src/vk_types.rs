use ash::extensions::khr::{Surface, Swapchain};
use ash::{vk, Device, Entry, Instance};
#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use std::path::PathBuf;
use thiserror::Error;

/// Maps an `ash::prelude::VkResult` into an [`EngineError::Vulkan`] tagged with the call site.
#[macro_export]
macro_rules! vk_check {
    ($x:expr, $context:expr) => {
        $x.map_err(|result| $crate::vk_types::EngineError::Vulkan {
            context: $context,
            result,
        })
    };
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("SDL error: {0}")]
    Sdl(String),
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
    #[error("shader file {} not found", .path.display())]
    ShaderNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader file {} is not valid SPIR-V", .path.display())]
    InvalidShader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to find a suitable GPU")]
    NoSuitableDevice,
    #[error("frame ring needs at least one slot")]
    EmptyFrameRing,
    #[error("{frames} frame slots for {images} swapchain images")]
    FrameCountMismatch { frames: usize, images: u32 },
    #[error("image index {index} out of range for {image_count} swapchain images")]
    ImageIndexOutOfRange { index: u32, image_count: u32 },
    #[error("swapchain is out of date")]
    SwapchainOutOfDate,
    #[error("{context} failed: {result}")]
    Vulkan {
        context: &'static str,
        #[source]
        result: vk::Result,
    },
}

/// Loader, instance and the instance-level children. Null handles are valid to destroy,
/// so this can drop before the messenger or surface exist.
pub struct InstanceContext {
    pub _entry: Entry,
    pub instance: Instance,
    #[cfg(debug_assertions)]
    pub debug_utils_loader: DebugUtils,
    #[cfg(debug_assertions)]
    pub debug_messenger: vk::DebugUtilsMessengerEXT,
    pub surface_loader: Surface,
    pub surface: vk::SurfaceKHR,
}

/// Device-level handles. Everything else created by the engine is a child of `device`
/// and has to be released before this drops; `instance_context` goes after the device.
pub struct DeviceContext {
    pub device: Device,
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub instance_context: InstanceContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

pub struct SwapchainBundle {
    pub device: Device,
    pub loader: Swapchain,
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainBundle {
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }
}

pub struct TrianglePipeline {
    pub device: Device,
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

// one prerecorded buffer per framebuffer, never re-recorded
pub struct CommandTable {
    pub device: Device,
    pub command_pool: vk::CommandPool,
    pub command_buffers: Vec<vk::CommandBuffer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_check_passes_success_through() {
        let ok: ash::prelude::VkResult<u32> = Ok(7);
        assert_eq!(vk_check!(ok, "noop").unwrap(), 7);
    }

    #[test]
    fn vk_check_tags_failures() {
        let err: ash::prelude::VkResult<()> = Err(vk::Result::ERROR_DEVICE_LOST);
        match vk_check!(err, "wait_for_fences") {
            Err(EngineError::Vulkan { context, result }) => {
                assert_eq!(context, "wait_for_fences");
                assert_eq!(result, vk::Result::ERROR_DEVICE_LOST);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shader_errors_name_the_path() {
        let err = EngineError::ShaderNotFound {
            path: PathBuf::from("shaders/triangle.vert.spv"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "shader file shaders/triangle.vert.spv not found");
    }

    #[test]
    fn shared_queue_family() {
        assert!(QueueFamilies { graphics: 0, present: 0 }.is_shared());
        assert!(!QueueFamilies { graphics: 0, present: 2 }.is_shared());
    }
}
