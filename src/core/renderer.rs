use ash::vk;
use std::collections::BTreeMap;
use std::ffi::CString;
use std::path::Path;
use winit::window::Window;

use super::resource_manager::{FrameSync, GpuImage, MappedBuffer, ResourceManager, DEPTH_FORMAT};
use super::{SwapchainManager, VulkanContext};
use crate::config::{RenderConfigData, SphereConfigData};
use crate::core::lighting::LightUniforms;
use crate::frame::{FramePacket, ObjectUniforms, RenderBackend, Submission, Viewport};
use crate::material::Material;
use crate::mesh::{Mesh, Vertex};
use crate::texture::{LoadedTexture, TextureId};

/// Size of the per-frame object uniform array; must match the shader
pub const MAX_DRAWABLES: usize = 32;
/// Texture descriptor sets available, including the white fallback
const MAX_TEXTURES: u32 = 16;

/// Selects the object slot and sampling mode for one draw
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawPushConstants {
    object_index: u32,
    textured: u32,
}

/// A sampled image bound through its own descriptor set
struct TextureSlot {
    image: GpuImage,
    set: vk::DescriptorSet,
}

/// Vulkan implementation of the frame backend.
///
/// One render pass with color + depth, one pipeline for all bodies, one
/// shared sphere mesh. Lights and object matrices are written to per-frame
/// uniform buffers; push constants pick the object slot for each draw.
pub struct VulkanRenderer {
    swapchain: SwapchainManager,
    depth: GpuImage,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    frame_set_layout: vk::DescriptorSetLayout,
    texture_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,

    frame_pool: vk::DescriptorPool,
    frame_sets: Vec<vk::DescriptorSet>,
    light_buffers: Vec<MappedBuffer>,
    object_buffers: Vec<MappedBuffer>,

    texture_pool: vk::DescriptorPool,
    sampler: vk::Sampler,
    white: TextureSlot,
    textures: BTreeMap<TextureId, TextureSlot>,

    vertex_buffer: vk::Buffer,
    vertex_buffer_memory: vk::DeviceMemory,
    index_buffer: vk::Buffer,
    index_buffer_memory: vk::DeviceMemory,
    index_count: u32,

    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    sync: Vec<FrameSync>,
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
    frames_in_flight: usize,

    clear_color: [f32; 4],
    framebuffer_resized: bool,
    warned_overflow: bool,

    // Dropped after every handle above is destroyed; the surface goes before its window
    context: VulkanContext,
    window: Window,
}

impl VulkanRenderer {
    pub fn new(window: Window, render: &RenderConfigData, sphere: &SphereConfigData) -> anyhow::Result<Self> {
        let context = VulkanContext::new(&window, "orrery")?;
        let frames_in_flight = render.frames_in_flight.max(1);

        unsafe {
            let device = &context.device;
            let size = window.inner_size();
            let swapchain = SwapchainManager::new(
                &context,
                vk::Extent2D {
                    width: size.width,
                    height: size.height,
                },
            )?;

            let render_pass = Self::create_render_pass(device, swapchain.format)?;
            let depth = ResourceManager::create_depth_resources(
                &context.instance,
                context.physical_device,
                device,
                swapchain.extent,
            )?;
            let framebuffers =
                Self::create_framebuffers(device, &swapchain.image_views, depth.view, render_pass, swapchain.extent)?;

            let frame_set_layout = Self::create_frame_set_layout(device)?;
            let texture_set_layout = Self::create_texture_set_layout(device)?;
            let (pipeline_layout, pipeline) = Self::create_graphics_pipeline(
                device,
                Path::new(&render.shader_dir),
                render_pass,
                &[frame_set_layout, texture_set_layout],
            )?;

            let light_buffers = ResourceManager::create_uniform_buffers(
                &context.instance,
                context.physical_device,
                device,
                std::mem::size_of::<LightUniforms>() as vk::DeviceSize,
                frames_in_flight,
            )?;
            let object_buffers = ResourceManager::create_uniform_buffers(
                &context.instance,
                context.physical_device,
                device,
                (std::mem::size_of::<ObjectUniforms>() * MAX_DRAWABLES) as vk::DeviceSize,
                frames_in_flight,
            )?;

            let frame_pool = Self::create_frame_pool(device, frames_in_flight)?;
            let frame_sets = Self::create_frame_sets(
                device,
                frame_pool,
                frame_set_layout,
                &light_buffers,
                &object_buffers,
            )?;

            let command_pool = ResourceManager::create_command_pool(device, context.graphics_queue_family)?;
            let command_buffers = ResourceManager::create_command_buffers(device, command_pool, frames_in_flight)?;
            let sync = ResourceManager::create_sync_objects(device, frames_in_flight)?;

            let mesh = Mesh::create_sphere(sphere.radius, sphere.subdivisions_axis, sphere.subdivisions_height);
            let (vertex_buffer, vertex_buffer_memory) = ResourceManager::create_device_local_buffer::<Vertex>(
                &context.instance,
                context.physical_device,
                device,
                command_pool,
                context.graphics_queue,
                &mesh.vertices,
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?;
            let (index_buffer, index_buffer_memory) = ResourceManager::create_device_local_buffer::<u32>(
                &context.instance,
                context.physical_device,
                device,
                command_pool,
                context.graphics_queue,
                &mesh.indices,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?;
            tracing::debug!(
                "Sphere mesh uploaded: {} vertices, {} indices",
                mesh.vertices.len(),
                mesh.indices.len()
            );

            let texture_pool = Self::create_texture_pool(device)?;
            let sampler = ResourceManager::create_sampler(device)?;
            let white_image = ResourceManager::create_texture_image(
                &context.instance,
                context.physical_device,
                device,
                command_pool,
                context.graphics_queue,
                1,
                1,
                &[255, 255, 255, 255],
            )?;
            let white_set = Self::allocate_texture_set(device, texture_pool, texture_set_layout)?;
            Self::write_texture_set(device, white_set, white_image.view, sampler);

            let images_in_flight = vec![vk::Fence::null(); swapchain.images.len()];

            tracing::info!(
                "Renderer ready: {}x{}, {} frames in flight",
                swapchain.extent.width,
                swapchain.extent.height,
                frames_in_flight
            );

            Ok(Self {
                swapchain,
                depth,
                render_pass,
                framebuffers,
                frame_set_layout,
                texture_set_layout,
                pipeline_layout,
                pipeline,
                frame_pool,
                frame_sets,
                light_buffers,
                object_buffers,
                texture_pool,
                sampler,
                white: TextureSlot {
                    image: white_image,
                    set: white_set,
                },
                textures: BTreeMap::new(),
                vertex_buffer,
                vertex_buffer_memory,
                index_buffer,
                index_buffer_memory,
                index_count: mesh.indices.len() as u32,
                command_pool,
                command_buffers,
                sync,
                images_in_flight,
                current_frame: 0,
                frames_in_flight,
                clear_color: render.clear_color.to_array(),
                framebuffer_resized: false,
                warned_overflow: false,
                context,
                window,
            })
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Flag the swapchain for recreation before the next frame
    pub fn handle_resize(&mut self) {
        self.framebuffer_resized = true;
    }

    unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> anyhow::Result<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let depth_attachment = vk::AttachmentDescription::default()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let color_attachment_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let depth_attachment_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_attachment_ref))
            .depth_stencil_attachment(&depth_attachment_ref);

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );

        let attachments = [color_attachment, depth_attachment];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        Ok(device.create_render_pass(&create_info, None)?)
    }

    unsafe fn create_framebuffers(
        device: &ash::Device,
        image_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
    ) -> anyhow::Result<Vec<vk::Framebuffer>> {
        image_views
            .iter()
            .map(|&image_view| {
                let attachments = [image_view, depth_view];
                let create_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);

                device
                    .create_framebuffer(&create_info, None)
                    .map_err(|e| anyhow::anyhow!("Failed to create framebuffer: {}", e))
            })
            .collect()
    }

    /// Set 0: light block (binding 0) and object array (binding 1)
    unsafe fn create_frame_set_layout(device: &ash::Device) -> anyhow::Result<vk::DescriptorSetLayout> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT),
            vk::DescriptorSetLayoutBinding::default()
                .binding(1)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT),
        ];
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        Ok(device.create_descriptor_set_layout(&create_info, None)?)
    }

    /// Set 1: body texture
    unsafe fn create_texture_set_layout(device: &ash::Device) -> anyhow::Result<vk::DescriptorSetLayout> {
        let binding = vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT);
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(std::slice::from_ref(&binding));

        Ok(device.create_descriptor_set_layout(&create_info, None)?)
    }

    unsafe fn create_graphics_pipeline(
        device: &ash::Device,
        shader_dir: &Path,
        render_pass: vk::RenderPass,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> anyhow::Result<(vk::PipelineLayout, vk::Pipeline)> {
        let vert_shader_module = ResourceManager::load_shader(device, &shader_dir.join("body.vert.spv"))?;
        let frag_shader_module = match ResourceManager::load_shader(device, &shader_dir.join("body.frag.spv")) {
            Ok(module) => module,
            Err(e) => {
                device.destroy_shader_module(vert_shader_module, None);
                return Err(e);
            }
        };

        let entry_point = CString::new("main")?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_shader_module)
                .name(&entry_point),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_shader_module)
                .name(&entry_point),
        ];

        let binding_description = Vertex::get_binding_description();
        let attribute_descriptions = Vertex::get_attribute_descriptions();

        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(std::slice::from_ref(&binding_description))
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic so a resize only rebuilds the swapchain
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(std::mem::size_of::<DrawPushConstants>() as u32);

        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(std::slice::from_ref(&push_constant_range));

        let pipeline_layout = device.create_pipeline_layout(&pipeline_layout_info, None)?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = device
            .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
            .map_err(|e| anyhow::anyhow!("Failed to create graphics pipeline: {:?}", e.1));

        device.destroy_shader_module(vert_shader_module, None);
        device.destroy_shader_module(frag_shader_module, None);

        Ok((pipeline_layout, pipelines?[0]))
    }

    unsafe fn create_frame_pool(device: &ash::Device, count: usize) -> anyhow::Result<vk::DescriptorPool> {
        let pool_size = vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(2 * count as u32);

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(std::slice::from_ref(&pool_size))
            .max_sets(count as u32);

        Ok(device.create_descriptor_pool(&create_info, None)?)
    }

    unsafe fn create_frame_sets(
        device: &ash::Device,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        light_buffers: &[MappedBuffer],
        object_buffers: &[MappedBuffer],
    ) -> anyhow::Result<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; light_buffers.len()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let descriptor_sets = device.allocate_descriptor_sets(&alloc_info)?;

        for ((&set, lights), objects) in descriptor_sets.iter().zip(light_buffers).zip(object_buffers) {
            let light_info = vk::DescriptorBufferInfo::default()
                .buffer(lights.buffer)
                .offset(0)
                .range(lights.size);
            let object_info = vk::DescriptorBufferInfo::default()
                .buffer(objects.buffer)
                .offset(0)
                .range(objects.size);

            let descriptor_writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(&light_info)),
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(&object_info)),
            ];

            device.update_descriptor_sets(&descriptor_writes, &[]);
        }

        Ok(descriptor_sets)
    }

    unsafe fn create_texture_pool(device: &ash::Device) -> anyhow::Result<vk::DescriptorPool> {
        let pool_size = vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(MAX_TEXTURES);

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(std::slice::from_ref(&pool_size))
            .max_sets(MAX_TEXTURES);

        Ok(device.create_descriptor_pool(&pool_info, None)?)
    }

    unsafe fn allocate_texture_set(
        device: &ash::Device,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> anyhow::Result<vk::DescriptorSet> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(std::slice::from_ref(&layout));

        Ok(device.allocate_descriptor_sets(&alloc_info)?[0])
    }

    unsafe fn write_texture_set(device: &ash::Device, set: vk::DescriptorSet, view: vk::ImageView, sampler: vk::Sampler) {
        let image_info = vk::DescriptorImageInfo::default()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(view)
            .sampler(sampler);

        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&image_info));

        device.update_descriptor_sets(std::slice::from_ref(&write), &[]);
    }

    /// Create or replace the image behind a texture handle
    unsafe fn upload_texture(&mut self, id: TextureId, width: u32, height: u32, pixels: &[u8]) -> anyhow::Result<()> {
        let device = &self.context.device;
        let image = ResourceManager::create_texture_image(
            &self.context.instance,
            self.context.physical_device,
            device,
            self.command_pool,
            self.context.graphics_queue,
            width,
            height,
            pixels,
        )?;

        match self.textures.get_mut(&id) {
            Some(slot) => {
                // The old image may still be referenced by frames in flight
                device.device_wait_idle()?;
                Self::write_texture_set(device, slot.set, image.view, self.sampler);
                slot.image.destroy(device);
                slot.image = image;
            }
            None => {
                let set = match Self::allocate_texture_set(device, self.texture_pool, self.texture_set_layout) {
                    Ok(set) => set,
                    Err(e) => {
                        image.destroy(device);
                        return Err(e);
                    }
                };
                Self::write_texture_set(device, set, image.view, self.sampler);
                self.textures.insert(id, TextureSlot { image, set });
            }
        }

        Ok(())
    }

    /// Bind placeholders for new texture handles and swap in decoded images
    unsafe fn apply_textures(&mut self, packet: &FramePacket) {
        for draw in &packet.draws {
            if let Material::Texture { texture, placeholder } = draw.material {
                if self.textures.contains_key(&texture) {
                    continue;
                }
                if let Err(e) = self.upload_texture(texture, 1, 1, &placeholder) {
                    tracing::warn!("Placeholder for {:?} failed: {:#}", texture, e);
                }
            }
        }

        for LoadedTexture { id, width, height, pixels } in &packet.textures {
            match self.upload_texture(*id, *width, *height, pixels) {
                Ok(()) => tracing::debug!("Texture {:?} swapped in ({}x{})", id, width, height),
                Err(e) => tracing::warn!("Upload of texture {:?} failed, keeping placeholder: {:#}", id, e),
            }
        }
    }

    fn write_uniforms(&mut self, packet: &FramePacket) {
        let frame = self.current_frame;
        self.light_buffers[frame].write(0, bytemuck::bytes_of(&packet.lights));

        if packet.draws.len() > MAX_DRAWABLES && !self.warned_overflow {
            tracing::warn!("{} drawables exceed the {} object slots", packet.draws.len(), MAX_DRAWABLES);
            self.warned_overflow = true;
        }

        let stride = std::mem::size_of::<ObjectUniforms>();
        for (i, draw) in packet.draws.iter().take(MAX_DRAWABLES).enumerate() {
            self.object_buffers[frame].write(i * stride, bytemuck::bytes_of(&draw.uniforms));
        }
    }

    unsafe fn record_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        image_index: usize,
        packet: &FramePacket,
    ) -> anyhow::Result<()> {
        let device = &self.context.device;
        let extent = self.swapchain.extent;

        device.begin_command_buffer(command_buffer, &vk::CommandBufferBeginInfo::default())?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[image_index])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        device.cmd_begin_render_pass(command_buffer, &render_pass_info, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, self.pipeline);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(command_buffer, 0, std::slice::from_ref(&viewport));
        device.cmd_set_scissor(
            command_buffer,
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            }],
        );

        device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer], &[0]);
        device.cmd_bind_index_buffer(command_buffer, self.index_buffer, 0, vk::IndexType::UINT32);
        device.cmd_bind_descriptor_sets(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline_layout,
            0,
            &[self.frame_sets[self.current_frame]],
            &[],
        );

        for (i, draw) in packet.draws.iter().take(MAX_DRAWABLES).enumerate() {
            let (set, textured) = match draw.material.texture().and_then(|id| self.textures.get(&id)) {
                Some(slot) => (slot.set, 1),
                None => (self.white.set, 0),
            };

            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                1,
                &[set],
                &[],
            );

            let push = DrawPushConstants {
                object_index: i as u32,
                textured,
            };
            device.cmd_push_constants(
                command_buffer,
                self.pipeline_layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&push),
            );

            device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
        }

        device.cmd_end_render_pass(command_buffer);
        device.end_command_buffer(command_buffer)?;

        Ok(())
    }

    /// Rebuild size-dependent resources. Returns false while the window is minimized.
    unsafe fn recreate_swapchain(&mut self) -> anyhow::Result<bool> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(false);
        }

        self.context.device.device_wait_idle()?;
        self.cleanup_swapchain();

        self.swapchain.recreate(
            &self.context,
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        )?;

        let device = &self.context.device;
        self.depth = ResourceManager::create_depth_resources(
            &self.context.instance,
            self.context.physical_device,
            device,
            self.swapchain.extent,
        )?;
        self.framebuffers = Self::create_framebuffers(
            device,
            &self.swapchain.image_views,
            self.depth.view,
            self.render_pass,
            self.swapchain.extent,
        )?;
        self.images_in_flight = vec![vk::Fence::null(); self.swapchain.images.len()];
        self.framebuffer_resized = false;

        Ok(true)
    }

    unsafe fn cleanup_swapchain(&mut self) {
        let device = &self.context.device;
        self.depth.destroy(device);
        for &framebuffer in &self.framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
        self.framebuffers.clear();
    }

    /// Textures in the packet are only taken once an image has been acquired
    unsafe fn draw_frame(&mut self, packet: &FramePacket) -> anyhow::Result<Submission> {
        if self.framebuffer_resized && !self.recreate_swapchain()? {
            return Ok(Submission::Skipped);
        }

        let sync = self.sync[self.current_frame];
        self.context.device.wait_for_fences(&[sync.in_flight], true, u64::MAX)?;

        let result = self.swapchain.swapchain_loader.acquire_next_image(
            self.swapchain.swapchain,
            u64::MAX,
            sync.image_available,
            vk::Fence::null(),
        );

        let image_index = match result {
            Ok((image_index, _)) => image_index as usize,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recreate_swapchain()?;
                return Ok(Submission::Skipped);
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to acquire swap chain image: {}", e)),
        };

        self.apply_textures(packet);

        // Wait for this image if an older frame is still rendering into it
        let image_fence = self.images_in_flight[image_index];
        if image_fence != vk::Fence::null() {
            self.context.device.wait_for_fences(&[image_fence], true, u64::MAX)?;
        }
        self.images_in_flight[image_index] = sync.in_flight;

        self.write_uniforms(packet);

        let command_buffer = self.command_buffers[self.current_frame];
        let device = &self.context.device;
        device.reset_fences(&[sync.in_flight])?;
        device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
        self.record_command_buffer(command_buffer, image_index, packet)?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        device.queue_submit(self.context.graphics_queue, &[submit_info], sync.in_flight)?;

        let swapchains = [self.swapchain.swapchain];
        let image_indices = [image_index as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = self
            .swapchain
            .swapchain_loader
            .queue_present(self.context.present_queue, &present_info);

        match result {
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                self.recreate_swapchain()?;
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to present swap chain image: {}", e)),
            Ok(false) => {}
        }

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        Ok(Submission::Drawn)
    }
}

impl RenderBackend for VulkanRenderer {
    fn viewport(&self) -> Viewport {
        let extent = self.swapchain.extent;
        Viewport::new(extent.width, extent.height)
    }

    fn submit(&mut self, packet: &FramePacket) -> anyhow::Result<Submission> {
        unsafe { self.draw_frame(packet) }
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        unsafe {
            let device = &self.context.device;
            if let Err(e) = device.device_wait_idle() {
                tracing::warn!("device_wait_idle failed during shutdown: {}", e);
            }

            for slot in self.textures.values() {
                slot.image.destroy(device);
            }
            self.white.image.destroy(device);
            device.destroy_sampler(self.sampler, None);
            device.destroy_descriptor_pool(self.texture_pool, None);

            for buffer in self.light_buffers.iter().chain(&self.object_buffers) {
                buffer.destroy(device);
            }
            device.destroy_descriptor_pool(self.frame_pool, None);

            device.destroy_buffer(self.index_buffer, None);
            device.free_memory(self.index_buffer_memory, None);
            device.destroy_buffer(self.vertex_buffer, None);
            device.free_memory(self.vertex_buffer_memory, None);

            for sync in &self.sync {
                sync.destroy(device);
            }
            device.destroy_command_pool(self.command_pool, None);

            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_set_layout(self.texture_set_layout, None);
            device.destroy_descriptor_set_layout(self.frame_set_layout, None);

            self.depth.destroy(device);
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
            self.swapchain.destroy(device);
        }
    }
}
