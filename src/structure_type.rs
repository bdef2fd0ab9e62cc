use std::{ffi::c_void, fmt, ptr};

use ash::vk::{self, StructureType};

/// A Vulkan structure that carries an `s_type` tag and a `p_next` link, and so
/// can take part in a [`StructureChain`](crate::StructureChain).
///
/// Every supported ash structure is registered below. A type that is not
/// registered does not satisfy this bound, so asking for its tag is a build
/// error rather than a wrong value at run time.
///
/// ```compile_fail
/// use ash::vk;
/// use vulkan_raii::structure_type_of;
///
/// // plain data, no s_type / p_next
/// let _ = structure_type_of::<vk::Extent2D>();
/// ```
///
/// # Safety
///
/// `STRUCTURE_TYPE` must be the tag Vulkan expects for the implementing type,
/// and `next`/`set_next` must read and write the structure's own `p_next`
/// field. The type must be `#[repr(C)]` with `s_type` and `p_next` as its
/// leading fields, since drivers walk the chain through `VkBaseOutStructure`.
pub unsafe trait Linkable {
    const STRUCTURE_TYPE: StructureType;

    fn structure_type(&self) -> StructureType;

    /// Writes `STRUCTURE_TYPE` into the structure's tag field.
    fn tag(&mut self);

    fn next(&self) -> *const c_void;

    fn set_next(&mut self, next: *mut c_void);

    /// Compares every field except `p_next`.
    fn payload_eq(&self, other: &Self) -> bool;
}

/// Returns the structure type tag for `T`.
#[inline]
pub const fn structure_type_of<T: Linkable>() -> StructureType {
    T::STRUCTURE_TYPE
}

/// Field-wise comparison of two ash structures through their `Debug` output,
/// which lists every field. ash does not derive `PartialEq`. Pointers compare
/// by address, and unions such as `ClearValue` are not looked into.
fn debug_eq<T: Linkable + fmt::Debug>(mut ours: T, mut theirs: T) -> bool {
    ours.set_next(ptr::null_mut());
    theirs.set_next(ptr::null_mut());
    format!("{:?}", ours) == format!("{:?}", theirs)
}

macro_rules! linkable {
    ($($ty:ident => $tag:ident),+ $(,)?) => {
        $(
            unsafe impl Linkable for vk::$ty {
                const STRUCTURE_TYPE: StructureType = StructureType::$tag;

                #[inline]
                fn structure_type(&self) -> StructureType {
                    self.s_type
                }

                #[inline]
                fn tag(&mut self) {
                    self.s_type = Self::STRUCTURE_TYPE;
                }

                #[inline]
                fn next(&self) -> *const c_void {
                    self.p_next as *const c_void
                }

                #[inline]
                fn set_next(&mut self, next: *mut c_void) {
                    self.p_next = next as _;
                }

                fn payload_eq(&self, other: &Self) -> bool {
                    debug_eq(*self, *other)
                }
            }
        )+

    };
}

linkable! {
    // instance and device
    ApplicationInfo => APPLICATION_INFO,
    InstanceCreateInfo => INSTANCE_CREATE_INFO,
    DebugUtilsMessengerCreateInfoEXT => DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
    ValidationFeaturesEXT => VALIDATION_FEATURES_EXT,
    DeviceCreateInfo => DEVICE_CREATE_INFO,
    DeviceQueueCreateInfo => DEVICE_QUEUE_CREATE_INFO,

    // presentation
    SwapchainCreateInfoKHR => SWAPCHAIN_CREATE_INFO_KHR,
    PresentInfoKHR => PRESENT_INFO_KHR,
    ImageFormatListCreateInfo => IMAGE_FORMAT_LIST_CREATE_INFO,

    // resources
    BufferCreateInfo => BUFFER_CREATE_INFO,
    ImageCreateInfo => IMAGE_CREATE_INFO,
    ImageViewCreateInfo => IMAGE_VIEW_CREATE_INFO,
    SamplerCreateInfo => SAMPLER_CREATE_INFO,
    ShaderModuleCreateInfo => SHADER_MODULE_CREATE_INFO,
    BufferDeviceAddressInfo => BUFFER_DEVICE_ADDRESS_INFO,

    // memory
    MemoryAllocateInfo => MEMORY_ALLOCATE_INFO,
    MemoryAllocateFlagsInfo => MEMORY_ALLOCATE_FLAGS_INFO,
    MappedMemoryRange => MAPPED_MEMORY_RANGE,

    // pipeline state
    PipelineCacheCreateInfo => PIPELINE_CACHE_CREATE_INFO,
    PipelineShaderStageCreateInfo => PIPELINE_SHADER_STAGE_CREATE_INFO,
    PipelineVertexInputStateCreateInfo => PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
    PipelineInputAssemblyStateCreateInfo => PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
    PipelineTessellationStateCreateInfo => PIPELINE_TESSELLATION_STATE_CREATE_INFO,
    PipelineViewportStateCreateInfo => PIPELINE_VIEWPORT_STATE_CREATE_INFO,
    PipelineRasterizationStateCreateInfo => PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
    PipelineMultisampleStateCreateInfo => PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
    PipelineDepthStencilStateCreateInfo => PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
    PipelineColorBlendStateCreateInfo => PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
    PipelineDynamicStateCreateInfo => PIPELINE_DYNAMIC_STATE_CREATE_INFO,
    PipelineLayoutCreateInfo => PIPELINE_LAYOUT_CREATE_INFO,
    PipelineRenderingCreateInfo => PIPELINE_RENDERING_CREATE_INFO,
    GraphicsPipelineCreateInfo => GRAPHICS_PIPELINE_CREATE_INFO,
    ComputePipelineCreateInfo => COMPUTE_PIPELINE_CREATE_INFO,

    // render passes and dynamic rendering
    RenderPassCreateInfo => RENDER_PASS_CREATE_INFO,
    RenderPassBeginInfo => RENDER_PASS_BEGIN_INFO,
    FramebufferCreateInfo => FRAMEBUFFER_CREATE_INFO,
    RenderingInfo => RENDERING_INFO,
    RenderingAttachmentInfo => RENDERING_ATTACHMENT_INFO,

    // commands
    CommandPoolCreateInfo => COMMAND_POOL_CREATE_INFO,
    CommandBufferAllocateInfo => COMMAND_BUFFER_ALLOCATE_INFO,
    CommandBufferBeginInfo => COMMAND_BUFFER_BEGIN_INFO,
    CommandBufferInheritanceInfo => COMMAND_BUFFER_INHERITANCE_INFO,

    // descriptors
    DescriptorSetLayoutCreateInfo => DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
    DescriptorSetLayoutBindingFlagsCreateInfo => DESCRIPTOR_SET_LAYOUT_BINDING_FLAGS_CREATE_INFO,
    DescriptorPoolCreateInfo => DESCRIPTOR_POOL_CREATE_INFO,
    DescriptorSetAllocateInfo => DESCRIPTOR_SET_ALLOCATE_INFO,
    WriteDescriptorSet => WRITE_DESCRIPTOR_SET,

    // synchronisation and submission
    FenceCreateInfo => FENCE_CREATE_INFO,
    SemaphoreCreateInfo => SEMAPHORE_CREATE_INFO,
    SemaphoreTypeCreateInfo => SEMAPHORE_TYPE_CREATE_INFO,
    EventCreateInfo => EVENT_CREATE_INFO,
    QueryPoolCreateInfo => QUERY_POOL_CREATE_INFO,
    SubmitInfo => SUBMIT_INFO,
    SubmitInfo2 => SUBMIT_INFO_2,
    SemaphoreSubmitInfo => SEMAPHORE_SUBMIT_INFO,
    CommandBufferSubmitInfo => COMMAND_BUFFER_SUBMIT_INFO,

    // barriers
    MemoryBarrier => MEMORY_BARRIER,
    BufferMemoryBarrier => BUFFER_MEMORY_BARRIER,
    ImageMemoryBarrier => IMAGE_MEMORY_BARRIER,
    MemoryBarrier2 => MEMORY_BARRIER_2,
    BufferMemoryBarrier2 => BUFFER_MEMORY_BARRIER_2,
    ImageMemoryBarrier2 => IMAGE_MEMORY_BARRIER_2,
    DependencyInfo => DEPENDENCY_INFO,

    // feature and property queries
    PhysicalDeviceFeatures2 => PHYSICAL_DEVICE_FEATURES_2,
    PhysicalDeviceProperties2 => PHYSICAL_DEVICE_PROPERTIES_2,
    PhysicalDeviceVulkan11Features => PHYSICAL_DEVICE_VULKAN_1_1_FEATURES,
    PhysicalDeviceVulkan12Features => PHYSICAL_DEVICE_VULKAN_1_2_FEATURES,
    PhysicalDeviceVulkan13Features => PHYSICAL_DEVICE_VULKAN_1_3_FEATURES,
    PhysicalDeviceDescriptorIndexingFeatures => PHYSICAL_DEVICE_DESCRIPTOR_INDEXING_FEATURES,
    PhysicalDeviceDynamicRenderingFeatures => PHYSICAL_DEVICE_DYNAMIC_RENDERING_FEATURES,
    PhysicalDeviceSynchronization2Features => PHYSICAL_DEVICE_SYNCHRONIZATION_2_FEATURES,
    PhysicalDeviceBufferDeviceAddressFeatures => PHYSICAL_DEVICE_BUFFER_DEVICE_ADDRESS_FEATURES,
    PhysicalDeviceTimelineSemaphoreFeatures => PHYSICAL_DEVICE_TIMELINE_SEMAPHORE_FEATURES,
}
