use std::{collections::HashSet, ffi::CStr, pin::Pin, rc::Rc};

use anyhow::{anyhow, Result};
use ash::vk::{self, PhysicalDeviceType, QueueFamilyProperties, QueueFlags};
use tracing::{debug, info};

use crate::{
    swapchain::SwapchainSupportDetails, ChainList, Cons, InstanceGuard, StructureChain,
    SurfaceGuard,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// family capable of runing graphics related commands
    pub graphics_family: Option<u32>,
    /// family capable of displaying results on the screen
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Picks the first graphics family and the first family `supports_present`
    /// accepts, preferring one family that does both.
    pub fn find(
        queue_family_properties: &[QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> Result<bool>,
    ) -> Result<Self> {
        let mut indices = Self::default();
        for (index, properties) in queue_family_properties.iter().enumerate() {
            let index = u32::try_from(index)?;
            if properties.queue_count == 0 {
                continue;
            }
            let graphics = properties.queue_flags.contains(QueueFlags::GRAPHICS);
            let present = supports_present(index)?;
            if graphics && present {
                return Ok(Self {
                    graphics_family: Some(index),
                    present_family: Some(index),
                });
            }
            if graphics && indices.graphics_family.is_none() {
                indices.graphics_family = Some(index);
            }
            if present && indices.present_family.is_none() {
                indices.present_family = Some(index);
            }
        }
        Ok(indices)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    pub fn graphics(&self) -> Result<u32> {
        self.graphics_family.ok_or(anyhow!("No graphics family index"))
    }

    pub fn present(&self) -> Result<u32> {
        self.present_family.ok_or(anyhow!("No present family index"))
    }

    /// Distinct family indices, in ascending order.
    pub fn unique(&self) -> Vec<u32> {
        let mut indices = [self.graphics_family, self.present_family]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Names from `required` that are not in `available`.
pub fn missing_extensions(available: &[vk::ExtensionProperties], required: &[&str]) -> Vec<String> {
    let available_extension_names = available
        .iter()
        .filter_map(|extension| {
            unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }
                .to_str()
                .ok()
        })
        .collect::<HashSet<_>>();
    required
        .iter()
        .filter(|name| !available_extension_names.contains(*name))
        .map(|name| (*name).to_owned())
        .collect()
}

fn device_type_score(device_type: PhysicalDeviceType) -> u32 {
    match device_type {
        PhysicalDeviceType::DISCRETE_GPU => 3,
        PhysicalDeviceType::INTEGRATED_GPU => 2,
        PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

/// A physical device chosen for presenting to a surface.
pub struct PhysicalDevice {
    handle: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    queue_families: QueueFamilyIndices,
    instance: Rc<InstanceGuard>,
}

impl PhysicalDevice {
    /// Picks the best device with graphics and present queues, every
    /// extension in `required_extensions` and a usable swapchain.
    pub fn select(
        instance: &Rc<InstanceGuard>,
        surface: &SurfaceGuard,
        required_extensions: &[&str],
    ) -> Result<Self> {
        let mut best: Option<(u32, Self)> = None;
        for handle in unsafe { instance.enumerate_physical_devices() }? {
            let properties = unsafe { instance.get_physical_device_properties(handle) };
            let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();

            let queue_family_properties =
                unsafe { instance.get_physical_device_queue_family_properties(handle) };
            let queue_families = QueueFamilyIndices::find(&queue_family_properties, |index| {
                surface.get_physical_device_surface_support(handle, index)
            })?;
            if !queue_families.is_complete() {
                debug!("Skipping {}: missing queue families {:?}", name, queue_families);
                continue;
            }

            let extensions = unsafe { instance.enumerate_device_extension_properties(handle) }?;
            let missing = missing_extensions(&extensions, required_extensions);
            if !missing.is_empty() {
                debug!("Skipping {}: missing extensions {}", name, missing.join(", "));
                continue;
            }

            if !SwapchainSupportDetails::query(surface, handle)?.is_adequate() {
                debug!("Skipping {}: no surface formats or present modes", name);
                continue;
            }

            let score = device_type_score(properties.device_type);
            if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                best = Some((
                    score,
                    Self {
                        handle,
                        properties,
                        queue_families,
                        instance: Rc::clone(instance),
                    },
                ));
            }
        }
        let (_, physical_device) = best.ok_or(anyhow!("no suitable graphics cards found!"))?;
        info!("Using physical device {}", physical_device.name());
        Ok(physical_device)
    }

    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn instance(&self) -> &Rc<InstanceGuard> {
        &self.instance
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Fills every structure of a features chain.
    ///
    /// ```no_run
    /// # fn query(physical_device: &vulkan_raii::PhysicalDevice) {
    /// use ash::vk;
    /// use vulkan_raii::{chain, StructureChain};
    ///
    /// let mut features = StructureChain::new(chain![
    ///     vk::PhysicalDeviceFeatures2::default(),
    ///     vk::PhysicalDeviceVulkan13Features::default(),
    /// ]);
    /// physical_device.query_features(features.as_mut());
    /// let dynamic_rendering = features
    ///     .get::<vk::PhysicalDeviceVulkan13Features, _>()
    ///     .dynamic_rendering;
    /// # }
    /// ```
    pub fn query_features<T: ChainList>(
        &self,
        chain: Pin<&mut StructureChain<Cons<vk::PhysicalDeviceFeatures2, T>>>,
    ) {
        let mut features = chain.head_mut();
        unsafe {
            self.instance
                .get_physical_device_features2(self.handle, &mut *features)
        }
    }

    /// Fills every structure of a properties chain.
    pub fn query_properties<T: ChainList>(
        &self,
        chain: Pin<&mut StructureChain<Cons<vk::PhysicalDeviceProperties2, T>>>,
    ) {
        let mut properties = chain.head_mut();
        unsafe {
            self.instance
                .get_physical_device_properties2(self.handle, &mut *properties)
        }
    }

    pub fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        unsafe {
            self.instance
                .get_physical_device_memory_properties(self.handle)
        }
    }
}
