use ash::vk;

use super::VulkanContext;

/// Swapchain plus one view per presentable image
pub struct SwapchainManager {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::khr::swapchain::Device,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl SwapchainManager {
    /// Create a swapchain sized to `desired` unless the surface dictates an extent
    pub unsafe fn new(context: &VulkanContext, desired: vk::Extent2D) -> anyhow::Result<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(&context.instance, &context.device);
        let (swapchain, images, format, extent) =
            Self::create_swapchain(context, &swapchain_loader, desired, vk::SwapchainKHR::null())?;
        let image_views = Self::create_image_views(&context.device, &images, format)?;

        tracing::debug!("Swapchain created: {}x{}, {} images", extent.width, extent.height, images.len());

        Ok(Self {
            swapchain,
            swapchain_loader,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Replace the swapchain after a resize or an out-of-date present.
    /// The caller must have waited for the device to go idle.
    pub unsafe fn recreate(&mut self, context: &VulkanContext, desired: vk::Extent2D) -> anyhow::Result<()> {
        self.destroy_image_views(&context.device);

        let old = self.swapchain;
        let (swapchain, images, format, extent) =
            Self::create_swapchain(context, &self.swapchain_loader, desired, old)?;
        self.swapchain_loader.destroy_swapchain(old, None);

        self.image_views = Self::create_image_views(&context.device, &images, format)?;
        self.swapchain = swapchain;
        self.images = images;
        self.format = format;
        self.extent = extent;

        tracing::debug!("Swapchain recreated: {}x{}", extent.width, extent.height);
        Ok(())
    }

    unsafe fn create_swapchain(
        context: &VulkanContext,
        swapchain_loader: &ash::khr::swapchain::Device,
        desired: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> anyhow::Result<(vk::SwapchainKHR, Vec<vk::Image>, vk::Format, vk::Extent2D)> {
        let surface_loader = &context.surface_loader;
        let physical_device = context.physical_device;
        let surface = context.surface;

        let capabilities = surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?;
        let formats = surface_loader.get_physical_device_surface_formats(physical_device, surface)?;
        let present_modes = surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?;

        let surface_format = formats
            .iter()
            .find(|f| f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .or_else(|| formats.first())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Surface reports no formats"))?;

        // FIFO is always available and paces the loop to the display refresh
        let present_mode = if present_modes.contains(&vk::PresentModeKHR::FIFO) {
            vk::PresentModeKHR::FIFO
        } else {
            present_modes.first().copied().unwrap_or(vk::PresentModeKHR::FIFO)
        };

        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: desired
                    .width
                    .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                height: desired
                    .height
                    .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
            }
        };

        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let queue_family_indices = [context.graphics_queue_family, context.present_queue_family];
        let concurrent = context.graphics_queue_family != context.present_queue_family;

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if concurrent {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = swapchain_loader.create_swapchain(&create_info, None)?;
        let images = swapchain_loader.get_swapchain_images(swapchain)?;

        Ok((swapchain, images, surface_format.format, extent))
    }

    unsafe fn create_image_views(
        device: &ash::Device,
        images: &[vk::Image],
        format: vk::Format,
    ) -> anyhow::Result<Vec<vk::ImageView>> {
        images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                device
                    .create_image_view(&create_info, None)
                    .map_err(|e| anyhow::anyhow!("Failed to create image view: {}", e))
            })
            .collect()
    }

    unsafe fn destroy_image_views(&mut self, device: &ash::Device) {
        for &image_view in &self.image_views {
            device.destroy_image_view(image_view, None);
        }
        self.image_views.clear();
    }

    /// Release views and the swapchain. Must run before the device is destroyed.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.destroy_image_views(device);
        self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        self.swapchain = vk::SwapchainKHR::null();
    }
}
