//! Owning wrappers for Vulkan objects and statically typed `p_next` chains.

#[macro_use]
mod structure_chain;

mod command;
mod debug_utils;
mod descriptor;
mod guard;
mod image_view;
mod instance;
mod logging;
mod logical_device;
mod memory;
mod p_next;
mod physical_device;
mod pipeline;
mod structure_type;
mod surface;
mod swapchain;
mod sync;
mod window;

pub use command::{CommandBuffers, CommandPoolGuard};
pub use debug_utils::{messenger_create_info, DebugUtilsGuard};
pub use descriptor::{DescriptorPoolGuard, DescriptorSetLayoutBuilder, DescriptorSetLayoutGuard, DescriptorSets};
pub use guard::{Destroy, Guard};
pub use image_view::{ImageViewGuard, SamplerGuard};
pub use instance::{InstanceBuilder, InstanceGuard, ENABLE_VALIDATIONS, VALIDATION_LAYER};
pub use logging::init_logging;
pub use logical_device::{DeviceBuilder, LogicalDeviceGuard, Queue};
pub use memory::{AllocatorGuard, BufferBuilder, BufferGuard, ImageBuilder, ImageGuard, MemoryLocation};
pub use p_next::PNext;
pub use physical_device::{missing_extensions, PhysicalDevice, QueueFamilyIndices};
pub use pipeline::{
    GraphicsPipelineBuilder, PipelineGuard, PipelineLayoutGuard, ShaderModuleGuard,
};
pub use structure_chain::{
    At, ChainList, Cons, ElementMut, Here, Nil, Selector, StructureChain, There,
};
pub use structure_type::{structure_type_of, Linkable};
pub use surface::SurfaceGuard;
pub use swapchain::{SwapchainBuilder, SwapchainGuard, SwapchainSupportDetails};
pub use sync::{FenceGuard, SemaphoreGuard};
pub use window::{EventDispatcher, EventKind, WindowConfig, WindowManager};
