use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use winit::window::Window;

use crate::error::RenderError;

/// Instance, surface, device and queues for one window.
///
/// Every failure here means there is no usable graphics context; callers
/// treat any error from `new` as fatal for rendering.
pub struct VulkanContext {
    pub entry: Entry,
    pub instance: ash::Instance,
    pub debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
}

impl VulkanContext {
    pub fn new(window: &Window, app_name: &str) -> anyhow::Result<Self> {
        unsafe {
            let entry = Entry::load()
                .map_err(|e| RenderError::ContextUnavailable(format!("Vulkan loader: {}", e)))?;

            let app_name_cstr = CString::new(app_name)?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name_cstr)
                .application_version(vk::make_api_version(0, 0, 1, 0))
                .engine_name(&app_name_cstr)
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle()?.as_raw();
            let mut extensions: Vec<*const std::ffi::c_char> =
                ash_window::enumerate_required_extensions(display_handle)?.to_vec();

            #[cfg(debug_assertions)]
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());

            #[cfg(debug_assertions)]
            let layer_names = [CString::new("VK_LAYER_KHRONOS_validation")?];
            #[cfg(debug_assertions)]
            let layer_names_raw: Vec<*const std::ffi::c_char> =
                layer_names.iter().map(|name| name.as_ptr()).collect();

            #[allow(unused_mut)]
            let mut create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_extension_names(&extensions);

            #[cfg(debug_assertions)]
            {
                create_info = create_info.enabled_layer_names(&layer_names_raw);
            }

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| RenderError::ContextUnavailable(format!("instance creation: {}", e)))?;

            let debug_utils = Self::setup_debug_messenger(&entry, &instance)?;

            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle,
                window.window_handle()?.as_raw(),
                None,
            )
            .map_err(|e| RenderError::ContextUnavailable(format!("surface creation: {}", e)))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let (physical_device, indices) = Self::pick_physical_device(&instance, &surface_loader, surface)?;

            let (device, graphics_queue, present_queue) =
                Self::create_logical_device(&instance, physical_device, indices)?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = CStr::from_ptr(properties.device_name.as_ptr());
            tracing::info!("Using GPU {:?}", device_name);

            Ok(Self {
                entry,
                instance,
                debug_utils,
                surface,
                surface_loader,
                physical_device,
                device,
                graphics_queue,
                present_queue,
                graphics_queue_family: indices.graphics,
                present_queue_family: indices.present,
            })
        }
    }

    #[allow(unused_variables)]
    unsafe fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> anyhow::Result<Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>> {
        #[cfg(debug_assertions)]
        {
            let debug_utils_loader = ash::ext::debug_utils::Instance::new(entry, instance);

            let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
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
                .pfn_user_callback(Some(vulkan_debug_callback));

            let debug_messenger = debug_utils_loader.create_debug_utils_messenger(&debug_info, None)?;
            Ok(Some((debug_utils_loader, debug_messenger)))
        }

        #[cfg(not(debug_assertions))]
        Ok(None)
    }

    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> anyhow::Result<(vk::PhysicalDevice, QueueFamilies)> {
        let devices = instance.enumerate_physical_devices()?;

        devices
            .iter()
            .find_map(|&device| {
                if !Self::check_device_extension_support(instance, device) {
                    return None;
                }
                Self::find_queue_families(instance, device, surface_loader, surface)
                    .map(|indices| (device, indices))
            })
            .ok_or_else(|| RenderError::ContextUnavailable("no GPU with graphics and present support".into()).into())
    }

    unsafe fn find_queue_families(
        instance: &ash::Instance,
        device: vk::PhysicalDevice,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Option<QueueFamilies> {
        let queue_families = instance.get_physical_device_queue_family_properties(device);

        let mut graphics = None;
        let mut present = None;

        for (i, queue_family) in queue_families.iter().enumerate() {
            let index = i as u32;
            if graphics.is_none() && queue_family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }

            let present_support = surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .unwrap_or(false);
            if present.is_none() && present_support {
                present = Some(index);
            }

            if graphics.is_some() && present.is_some() {
                break;
            }
        }

        Some(QueueFamilies {
            graphics: graphics?,
            present: present?,
        })
    }

    unsafe fn check_device_extension_support(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
        let available_extensions = instance
            .enumerate_device_extension_properties(device)
            .unwrap_or_default();

        available_extensions.iter().any(|ext| {
            let name = CStr::from_ptr(ext.extension_name.as_ptr());
            ash::khr::swapchain::NAME == name
        })
    }

    unsafe fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        indices: QueueFamilies,
    ) -> anyhow::Result<(ash::Device, vk::Queue, vk::Queue)> {
        let mut unique_queue_families = vec![indices.graphics];
        if indices.present != indices.graphics {
            unique_queue_families.push(indices.present);
        }

        let queue_priority = 1.0f32;
        let queue_create_infos: Vec<_> = unique_queue_families
            .iter()
            .map(|&queue_family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(queue_family)
                    .queue_priorities(std::slice::from_ref(&queue_priority))
            })
            .collect();

        let device_features = vk::PhysicalDeviceFeatures::default();
        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        let device = instance.create_device(physical_device, &device_create_info, None)?;

        let graphics_queue = device.get_device_queue(indices.graphics, 0);
        let present_queue = device.get_device_queue(indices.present, 0);

        Ok((device, graphics_queue, present_queue))
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueFamilies {
    graphics: u32,
    present: u32,
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "vulkan", "{:?}: {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "vulkan", "{:?}: {}", message_type, message);
        }
        _ => {
            tracing::trace!(target: "vulkan", "{:?}: {}", message_type, message);
        }
    }

    vk::FALSE
}
