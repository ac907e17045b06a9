use ash::vk;
use std::path::Path;

use crate::error::RenderError;

/// Sampled RGBA8 image with its view
#[derive(Debug, Clone, Copy)]
pub struct GpuImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub width: u32,
    pub height: u32,
}

impl GpuImage {
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
    }
}

/// Buffer, image, command and shader helpers shared by the renderer
pub struct ResourceManager;

impl ResourceManager {
    pub unsafe fn create_buffer(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> anyhow::Result<(vk::Buffer, vk::DeviceMemory)> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = device.create_buffer(&buffer_info, None)?;
        let mem_requirements = device.get_buffer_memory_requirements(buffer);

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(mem_requirements.size)
            .memory_type_index(Self::find_memory_type(
                instance,
                physical_device,
                mem_requirements.memory_type_bits,
                properties,
            )?);

        let buffer_memory = device.allocate_memory(&alloc_info, None)?;
        device.bind_buffer_memory(buffer, buffer_memory, 0)?;

        Ok((buffer, buffer_memory))
    }

    pub unsafe fn find_memory_type(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> anyhow::Result<u32> {
        let mem_properties = instance.get_physical_device_memory_properties(physical_device);

        (0..mem_properties.memory_type_count)
            .find(|&i| {
                (type_filter & (1 << i)) != 0
                    && mem_properties.memory_types[i as usize]
                        .property_flags
                        .contains(properties)
            })
            .ok_or_else(|| anyhow::anyhow!("Failed to find suitable memory type"))
    }

    /// Record commands into a throwaway command buffer, submit and wait
    pub unsafe fn submit_one_time<F>(
        device: &ash::Device,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        record: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(command_pool)
            .command_buffer_count(1);

        let command_buffers = device.allocate_command_buffers(&alloc_info)?;
        let command_buffer = command_buffers[0];

        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(command_buffer, &begin_info)?;

        record(command_buffer);

        device.end_command_buffer(command_buffer)?;

        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        device.queue_submit(queue, std::slice::from_ref(&submit_info), vk::Fence::null())?;
        device.queue_wait_idle(queue)?;

        device.free_command_buffers(command_pool, &command_buffers);
        Ok(())
    }

    /// Upload `data` into a new device-local buffer through a staging buffer
    pub unsafe fn create_device_local_buffer<T: bytemuck::Pod>(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> anyhow::Result<(vk::Buffer, vk::DeviceMemory)> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer_size = bytes.len() as vk::DeviceSize;

        let (staging_buffer, staging_memory) = Self::create_staging_buffer(instance, physical_device, device, bytes)?;

        let (buffer, buffer_memory) = Self::create_buffer(
            instance,
            physical_device,
            device,
            buffer_size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let copied = Self::submit_one_time(device, command_pool, queue, |cmd| {
            let region = vk::BufferCopy::default().size(buffer_size);
            device.cmd_copy_buffer(cmd, staging_buffer, buffer, std::slice::from_ref(&region));
        });

        device.destroy_buffer(staging_buffer, None);
        device.free_memory(staging_memory, None);
        copied?;

        Ok((buffer, buffer_memory))
    }

    unsafe fn create_staging_buffer(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        bytes: &[u8],
    ) -> anyhow::Result<(vk::Buffer, vk::DeviceMemory)> {
        let size = bytes.len() as vk::DeviceSize;
        let (buffer, memory) = Self::create_buffer(
            instance,
            physical_device,
            device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let mapped = device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty())?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped as *mut u8, bytes.len());
        device.unmap_memory(memory);

        Ok((buffer, memory))
    }

    /// Host-visible uniform buffers, one per frame in flight, persistently mapped
    pub unsafe fn create_uniform_buffers(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        size: vk::DeviceSize,
        frame_count: usize,
    ) -> anyhow::Result<Vec<MappedBuffer>> {
        (0..frame_count)
            .map(|_| {
                let (buffer, memory) = Self::create_buffer(
                    instance,
                    physical_device,
                    device,
                    size,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )?;
                let mapped = device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty())?;
                Ok::<_, anyhow::Error>(MappedBuffer {
                    buffer,
                    memory,
                    mapped: mapped as *mut u8,
                    size,
                })
            })
            .collect()
    }

    pub unsafe fn create_command_pool(device: &ash::Device, queue_family_index: u32) -> anyhow::Result<vk::CommandPool> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        Ok(device.create_command_pool(&pool_info, None)?)
    }

    pub unsafe fn create_command_buffers(
        device: &ash::Device,
        command_pool: vk::CommandPool,
        count: usize,
    ) -> anyhow::Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        Ok(device.allocate_command_buffers(&alloc_info)?)
    }

    /// Per-frame image-available / render-finished semaphores and in-flight fences
    pub unsafe fn create_sync_objects(device: &ash::Device, frame_count: usize) -> anyhow::Result<Vec<FrameSync>> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        (0..frame_count)
            .map(|_| {
                Ok::<_, anyhow::Error>(FrameSync {
                    image_available: device.create_semaphore(&semaphore_info, None)?,
                    render_finished: device.create_semaphore(&semaphore_info, None)?,
                    in_flight: device.create_fence(&fence_info, None)?,
                })
            })
            .collect()
    }

    unsafe fn create_image(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> anyhow::Result<GpuImage> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = device.create_image(&image_info, None)?;
        let mem_requirements = device.get_image_memory_requirements(image);

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(mem_requirements.size)
            .memory_type_index(Self::find_memory_type(
                instance,
                physical_device,
                mem_requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?);

        let memory = device.allocate_memory(&alloc_info, None)?;
        device.bind_image_memory(image, memory, 0)?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = device.create_image_view(&view_info, None)?;

        Ok(GpuImage {
            image,
            memory,
            view,
            width: extent.width,
            height: extent.height,
        })
    }

    pub unsafe fn create_depth_resources(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        extent: vk::Extent2D,
    ) -> anyhow::Result<GpuImage> {
        Self::create_image(
            instance,
            physical_device,
            device,
            extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )
    }

    /// Upload tightly packed RGBA8 pixels into a sampled image
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn create_texture_image(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> anyhow::Result<GpuImage> {
        anyhow::ensure!(
            pixels.len() == (width as usize) * (height as usize) * 4,
            "texture data is {} bytes, expected {}x{} RGBA",
            pixels.len(),
            width,
            height
        );

        let texture = Self::create_image(
            instance,
            physical_device,
            device,
            vk::Extent2D { width, height },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )?;

        let (staging_buffer, staging_memory) = Self::create_staging_buffer(instance, physical_device, device, pixels)?;

        let uploaded = Self::submit_one_time(device, command_pool, queue, |cmd| {
            Self::transition_image_layout(
                device,
                cmd,
                texture.image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );

            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D { width, height, depth: 1 });
            device.cmd_copy_buffer_to_image(
                cmd,
                staging_buffer,
                texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&region),
            );

            Self::transition_image_layout(
                device,
                cmd,
                texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        });

        device.destroy_buffer(staging_buffer, None);
        device.free_memory(staging_memory, None);

        if let Err(e) = uploaded {
            texture.destroy(device);
            return Err(e);
        }

        Ok(texture)
    }

    /// Record a color image layout barrier for the two upload transitions
    unsafe fn transition_image_layout(
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        let (src_access_mask, dst_access_mask, src_stage, dst_stage) =
            if new_layout == vk::ImageLayout::TRANSFER_DST_OPTIMAL {
                (
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                )
            } else {
                (
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::SHADER_READ,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                )
            };

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(src_access_mask)
            .dst_access_mask(dst_access_mask);

        device.cmd_pipeline_barrier(
            command_buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            std::slice::from_ref(&barrier),
        );
    }

    pub unsafe fn create_sampler(device: &ash::Device) -> anyhow::Result<vk::Sampler> {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

        Ok(device.create_sampler(&sampler_info, None)?)
    }

    pub unsafe fn create_shader_module(device: &ash::Device, code: &[u8]) -> anyhow::Result<vk::ShaderModule> {
        let code_aligned = ash::util::read_spv(&mut std::io::Cursor::new(code))?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&code_aligned);

        Ok(device.create_shader_module(&create_info, None)?)
    }

    /// Read a compiled SPIR-V file and wrap it in a shader module
    pub unsafe fn load_shader(device: &ash::Device, path: &Path) -> anyhow::Result<vk::ShaderModule> {
        let code = std::fs::read(path).map_err(|_| RenderError::ShaderMissing(path.to_path_buf()))?;
        Self::create_shader_module(device, &code)
    }
}

/// Depth attachment format used by the render pass
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Persistently mapped host-coherent buffer
pub struct MappedBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    mapped: *mut u8,
    pub size: vk::DeviceSize,
}

impl MappedBuffer {
    /// Copy `bytes` to `offset`; writes past the end are truncated
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        let capacity = (self.size as usize).saturating_sub(offset);
        let len = bytes.len().min(capacity);
        // SAFETY: `mapped` covers `size` bytes for the lifetime of the buffer
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.add(offset), len);
        }
    }

    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.unmap_memory(self.memory);
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
    }
}

/// Synchronization for one frame in flight
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}
