use ash::vk;
use log::{debug, error, info, warn};
use std::ffi::CStr;

// routes validation layer messages into the log facade
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[vk {:?}] {}", message_type, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[vk {:?}] {}", message_type, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("[vk {:?}] {}", message_type, message),
        _ => debug!("[vk {:?}] {}", message_type, message),
    }

    vk::FALSE
}
