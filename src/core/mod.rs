pub mod camera;
pub mod lighting;
pub mod renderer;
pub mod resource_manager;
pub mod swapchain;
pub mod vulkan_context;

pub use camera::Camera;
pub use renderer::VulkanRenderer;
pub use resource_manager::ResourceManager;
pub use swapchain::SwapchainManager;
pub use vulkan_context::VulkanContext;
