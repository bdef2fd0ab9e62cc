use std::{ops::Deref, rc::Rc};

use anyhow::{bail, Result};
use ash::vk::{
    DescriptorPool, DescriptorPoolCreateFlags, DescriptorPoolCreateInfo, DescriptorPoolSize,
    DescriptorSet, DescriptorSetAllocateInfo, DescriptorSetLayout, DescriptorSetLayoutBinding,
    DescriptorSetLayoutCreateFlags, DescriptorSetLayoutCreateInfo, DescriptorType,
    ShaderStageFlags, WriteDescriptorSet,
};
use tracing::{debug, warn};

use crate::{Guard, LogicalDeviceGuard, PNext};

#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<DescriptorSetLayoutBinding>,
    flags: DescriptorSetLayoutCreateFlags,
    next: PNext,
}

impl DescriptorSetLayoutBuilder {
    pub fn binding(
        mut self,
        binding: u32,
        descriptor_type: DescriptorType,
        descriptor_count: u32,
        stage_flags: ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(descriptor_count)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    pub fn flags(mut self, flags: DescriptorSetLayoutCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// e.g. a `DescriptorSetLayoutBindingFlagsCreateInfo` for bindless layouts.
    pub fn next(mut self, next: impl Into<PNext>) -> Self {
        self.next = next.into();
        self
    }

    pub fn with_create_info<R>(&self, f: impl FnOnce(&DescriptorSetLayoutCreateInfo) -> R) -> Result<R> {
        let mut numbers = self.bindings.iter().map(|binding| binding.binding).collect::<Vec<_>>();
        numbers.sort_unstable();
        if numbers.windows(2).any(|pair| pair[0] == pair[1]) {
            bail!("descriptor set layout binds the same slot twice");
        }
        let mut create_info = DescriptorSetLayoutCreateInfo::builder()
            .flags(self.flags)
            .bindings(&self.bindings)
            .build();
        create_info.p_next = self.next.value();
        Ok(f(&create_info))
    }

    pub fn build(self, logical_device: &Rc<LogicalDeviceGuard>) -> Result<DescriptorSetLayoutGuard> {
        let layout = self.with_create_info(|create_info| unsafe {
            logical_device.create_descriptor_set_layout(create_info, None)
        })??;
        debug!("Descriptor set layout created with {} bindings", self.bindings.len());
        Ok(DescriptorSetLayoutGuard {
            layout: Guard::new(logical_device, layout),
        })
    }
}

/// RAII for DescriptorSetLayout
pub struct DescriptorSetLayoutGuard {
    layout: Guard<DescriptorSetLayout, LogicalDeviceGuard>,
}

impl Deref for DescriptorSetLayoutGuard {
    type Target = DescriptorSetLayout;

    fn deref(&self) -> &Self::Target {
        &self.layout
    }
}

/// RAII for DescriptorPool
pub struct DescriptorPoolGuard {
    pool: Guard<DescriptorPool, LogicalDeviceGuard>,
    flags: DescriptorPoolCreateFlags,
}

impl DescriptorPoolGuard {
    pub fn try_new(
        logical_device: &Rc<LogicalDeviceGuard>,
        max_sets: u32,
        pool_sizes: &[DescriptorPoolSize],
        flags: DescriptorPoolCreateFlags,
    ) -> Result<Rc<Self>> {
        let create_info = DescriptorPoolCreateInfo::builder()
            .flags(flags)
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        let pool = unsafe { logical_device.create_descriptor_pool(&create_info, None) }?;
        Ok(Rc::new(Self {
            pool: Guard::new(logical_device, pool),
            flags,
        }))
    }

    pub fn allocate(self: &Rc<Self>, layouts: &[DescriptorSetLayout]) -> Result<DescriptorSets> {
        let allocate_info = DescriptorSetAllocateInfo::builder()
            .descriptor_pool(*self.pool)
            .set_layouts(layouts);
        let descriptor_sets =
            unsafe { self.pool.parent().allocate_descriptor_sets(&allocate_info) }?;
        Ok(DescriptorSets {
            descriptor_sets,
            pool: Rc::clone(self),
        })
    }

    /// Sets can only be handed back individually from pools created with
    /// `FREE_DESCRIPTOR_SET`.
    pub fn frees_sets(&self) -> bool {
        self.flags
            .contains(DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
    }
}

impl Deref for DescriptorPoolGuard {
    type Target = DescriptorPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

/// Descriptor sets allocated together from one pool.
pub struct DescriptorSets {
    descriptor_sets: Vec<DescriptorSet>,
    pool: Rc<DescriptorPoolGuard>,
}

impl DescriptorSets {
    pub fn update(&self, writes: &[WriteDescriptorSet]) {
        unsafe { self.pool.pool.parent().update_descriptor_sets(writes, &[]) }
    }
}

impl Deref for DescriptorSets {
    type Target = [DescriptorSet];

    fn deref(&self) -> &Self::Target {
        &self.descriptor_sets
    }
}

impl Drop for DescriptorSets {
    fn drop(&mut self) {
        // otherwise they live until the pool is destroyed or reset
        if !self.pool.frees_sets() || self.descriptor_sets.is_empty() {
            return;
        }
        debug!("Freeing {} descriptor sets", self.descriptor_sets.len());
        let result = unsafe {
            self.pool
                .pool
                .parent()
                .free_descriptor_sets(*self.pool.pool, &self.descriptor_sets)
        };
        if let Err(error) = result {
            warn!("Failed to free descriptor sets: {}", error);
        }
    }
}
