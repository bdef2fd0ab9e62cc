use std::{ffi::CString, ops::Deref, rc::Rc};

use anyhow::{bail, Result};
use ash::{
    vk::{self, DeviceCreateInfo, DeviceQueueCreateInfo, StructureType},
    Device,
};
use tracing::debug;

use crate::{
    physical_device::QueueFamilyIndices, Destroy, InstanceGuard, PNext, PhysicalDevice,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Queue {
    pub family_index: u32,
    pub handle: vk::Queue,
}

/// Collects everything needed to create a [`LogicalDeviceGuard`].
#[derive(Default)]
pub struct DeviceBuilder {
    extensions: Vec<String>,
    features: Option<vk::PhysicalDeviceFeatures>,
    next: PNext,
}

impl DeviceBuilder {
    pub fn extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(names.into_iter().map(Into::into));
        self
    }

    /// Core features, for when `next` does not carry a `PhysicalDeviceFeatures2`.
    pub fn features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.features = Some(features);
        self
    }

    /// Extension structures to chain onto `VkDeviceCreateInfo`, typically the
    /// feature chain to enable.
    pub fn next(mut self, next: impl Into<PNext>) -> Self {
        self.next = next.into();
        self
    }

    pub fn with_create_info<R>(
        &self,
        queue_families: QueueFamilyIndices,
        f: impl FnOnce(&DeviceCreateInfo) -> R,
    ) -> Result<R> {
        if self.features.is_some() && self.next.contains(StructureType::PHYSICAL_DEVICE_FEATURES_2) {
            bail!("core features given both directly and through PhysicalDeviceFeatures2");
        }
        let queue_priorities = [1.0f32];
        let queue_indices = queue_families.unique();
        if queue_indices.is_empty() {
            bail!("no queue families to create queues from");
        }
        let device_queue_create_infos = queue_indices
            .iter()
            .map(|queue_family_index| {
                DeviceQueueCreateInfo::builder()
                    .queue_family_index(*queue_family_index)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect::<Vec<_>>();

        let device_extension_names: Vec<CString> = self
            .extensions
            .iter()
            .map(|extension_name| CString::new(extension_name.as_str()))
            .collect::<Result<_, _>>()?;
        let device_extension_name_ptrs = device_extension_names
            .iter()
            .map(|device_extension| device_extension.as_ptr())
            .collect::<Vec<_>>();
        debug!("Device extensions to enable: {}", self.extensions.join(", "));

        let mut device_create_info = DeviceCreateInfo::builder()
            .queue_create_infos(&device_queue_create_infos)
            .enabled_extension_names(&device_extension_name_ptrs);
        if let Some(features) = &self.features {
            device_create_info = device_create_info.enabled_features(features);
        }
        let mut device_create_info = device_create_info.build();
        device_create_info.p_next = self.next.value();

        Ok(f(&device_create_info))
    }

    pub fn build(self, physical_device: &PhysicalDevice) -> Result<Rc<LogicalDeviceGuard>> {
        let queue_families = physical_device.queue_families();
        debug!("Queue family indices: {:?}", queue_families);
        let instance = physical_device.instance();
        let device = self.with_create_info(queue_families, |create_info| unsafe {
            instance.create_device(physical_device.handle(), create_info, None)
        })??;

        let graphics_queue = queue(&device, queue_families.graphics()?);
        let present_queue = queue(&device, queue_families.present()?);
        Ok(Rc::new(LogicalDeviceGuard {
            device,
            physical_device: physical_device.handle(),
            queue_families,
            graphics_queue,
            present_queue,
            instance: Rc::clone(instance),
        }))
    }
}

fn queue(device: &Device, family_index: u32) -> Queue {
    Queue {
        family_index,
        handle: unsafe { device.get_device_queue(family_index, 0) },
    }
}

/// RAII for logical device
pub struct LogicalDeviceGuard {
    device: Device,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilyIndices,
    graphics_queue: Queue,
    present_queue: Queue,
    // need to keep a reference to the instance to ensure we get
    // dropped before it does
    instance: Rc<InstanceGuard>,
}

impl LogicalDeviceGuard {
    pub fn instance(&self) -> &Rc<InstanceGuard> {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn graphics_queue(&self) -> Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> Queue {
        self.present_queue
    }

    pub fn wait_idle(&self) -> Result<()> {
        Ok(unsafe { self.device.device_wait_idle() }?)
    }
}

impl Deref for LogicalDeviceGuard {
    type Target = Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl Drop for LogicalDeviceGuard {
    fn drop(&mut self) {
        debug!("Dropping LogicalDeviceGuard");
        unsafe { self.device.destroy_device(None) }
    }
}

macro_rules! destroy_with_device {
    ($($handle:ident => $destroy:ident),+ $(,)?) => {
        $(
            impl Destroy<vk::$handle> for LogicalDeviceGuard {
                fn destroy(&self, handle: vk::$handle) {
                    debug!("Destroying {}", stringify!($handle));
                    unsafe { self.device.$destroy(handle, None) }
                }
            }
        )+
    };
}

destroy_with_device! {
    Fence => destroy_fence,
    Semaphore => destroy_semaphore,
    ImageView => destroy_image_view,
    Sampler => destroy_sampler,
    ShaderModule => destroy_shader_module,
    PipelineLayout => destroy_pipeline_layout,
    Pipeline => destroy_pipeline,
    CommandPool => destroy_command_pool,
    DescriptorSetLayout => destroy_descriptor_set_layout,
    DescriptorPool => destroy_descriptor_pool,
}
