use ash::{Instance, vk};
use anyhow::{Context, Result};
use ash::extensions::khr::{Surface, Swapchain};
use std::ffi::CStr;
use crate::vk_types::{EngineError, QueueFamilies};

/// First device that can draw, present to `surface` and create a swapchain.
pub fn pick_physical_device_and_queues(instance : &Instance, surface_loader : &Surface, surface : vk::SurfaceKHR) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let physical_devices = unsafe {
        instance.enumerate_physical_devices().context("enumerating physical devices")?
    };
    log::debug!("{} devices (GPU) found with vulkan support.", physical_devices.len());
    for &physical_device in physical_devices.iter() {
        if !swapchain_supported(instance, physical_device)? {
            continue;
        }
        if let Some(families) = find_queue_families(instance, surface_loader, surface, physical_device)? {
            let properties = unsafe { instance.get_physical_device_properties(physical_device) };
            let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
            log::info!("using {} (graphics family {}, present family {})", name.to_string_lossy(), families.graphics, families.present);
            return Ok((physical_device, families));
        }
    }
    Err(EngineError::NoSuitableDevice.into())
}

fn find_queue_families(instance : &Instance, surface_loader : &Surface, surface : vk::SurfaceKHR, physical_device : vk::PhysicalDevice) -> Result<Option<QueueFamilies>> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    let mut present_support = Vec::with_capacity(families.len());
    for index in 0..families.len() as u32 {
        let supported = unsafe {
            surface_loader
                .get_physical_device_surface_support(physical_device, index, surface)
                .context("querying surface support")?
        };
        present_support.push(supported);
    }
    Ok(select_queue_families(&families, &present_support))
}

/// Prefers one family doing both graphics and present, otherwise the first of each.
pub fn select_queue_families(families : &[vk::QueueFamilyProperties], present_support : &[bool]) -> Option<QueueFamilies> {
    let is_graphics = |qfp : &vk::QueueFamilyProperties| qfp.queue_count > 0 && qfp.queue_flags.contains(vk::QueueFlags::GRAPHICS);
    let shared = families.iter().zip(present_support).position(|(qfp, &present)| is_graphics(qfp) && present);
    if let Some(index) = shared {
        return Some(QueueFamilies { graphics: index as u32, present: index as u32 });
    }
    let graphics = families.iter().position(is_graphics)?;
    let present = present_support.iter().position(|&present| present)?;
    Some(QueueFamilies { graphics: graphics as u32, present: present as u32 })
}

fn swapchain_supported(instance : &Instance, physical_device : vk::PhysicalDevice) -> Result<bool> {
    let extensions = unsafe {
        instance.enumerate_device_extension_properties(physical_device).context("enumerating device extensions")?
    };
    Ok(extensions.iter().any(|ext| {
        let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        name == Swapchain::name()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags : vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties { queue_flags: flags, queue_count: 1, ..Default::default() }
    }

    #[test]
    fn prefers_a_shared_family() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let selected = select_queue_families(&families, &[false, true, true]).unwrap();
        assert_eq!(selected, QueueFamilies { graphics: 2, present: 2 });
    }

    #[test]
    fn falls_back_to_separate_families() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let selected = select_queue_families(&families, &[false, true]).unwrap();
        assert_eq!(selected, QueueFamilies { graphics: 0, present: 1 });
    }

    #[test]
    fn needs_both_capabilities() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert_eq!(select_queue_families(&families, &[true]), None);
        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert_eq!(select_queue_families(&families, &[false]), None);
    }

    #[test]
    fn empty_families_are_skipped() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let families = [empty, family(vk::QueueFlags::GRAPHICS)];
        assert_eq!(select_queue_families(&families, &[true, true]), Some(QueueFamilies { graphics: 1, present: 1 }));
    }
}
