use std::{ops::Deref, rc::Rc};

use anyhow::Result;
use ash::vk::{
    Fence, FenceCreateFlags, FenceCreateInfo, Semaphore, SemaphoreCreateInfo,
    SemaphoreSignalInfo, SemaphoreType, SemaphoreTypeCreateInfo, SemaphoreWaitInfo,
};

use crate::{Guard, LogicalDeviceGuard, StructureChain};

/// RAII for Fence
pub struct FenceGuard {
    fence: Guard<Fence, LogicalDeviceGuard>,
}

impl FenceGuard {
    pub fn try_new(logical_device: &Rc<LogicalDeviceGuard>, signaled: bool) -> Result<Self> {
        let flags = match signaled {
            true => FenceCreateFlags::SIGNALED,
            false => FenceCreateFlags::empty(),
        };
        let create_info = FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { logical_device.create_fence(&create_info, None) }?;
        Ok(Self {
            fence: Guard::new(logical_device, fence),
        })
    }

    pub fn wait(&self, timeout: u64) -> Result<()> {
        Ok(unsafe {
            self.fence
                .parent()
                .wait_for_fences(&[*self.fence], true, timeout)
        }?)
    }

    pub fn reset(&self) -> Result<()> {
        Ok(unsafe { self.fence.parent().reset_fences(&[*self.fence]) }?)
    }

    pub fn is_signaled(&self) -> Result<bool> {
        Ok(unsafe { self.fence.parent().get_fence_status(*self.fence) }?)
    }
}

impl Deref for FenceGuard {
    type Target = Fence;

    fn deref(&self) -> &Self::Target {
        &self.fence
    }
}

/// RAII for Semaphore, either binary or timeline
pub struct SemaphoreGuard {
    semaphore: Guard<Semaphore, LogicalDeviceGuard>,
    semaphore_type: SemaphoreType,
}

impl SemaphoreGuard {
    pub fn try_new(logical_device: &Rc<LogicalDeviceGuard>) -> Result<Self> {
        let create_info = SemaphoreCreateInfo::builder();
        let semaphore = unsafe { logical_device.create_semaphore(&create_info, None) }?;
        Ok(Self {
            semaphore: Guard::new(logical_device, semaphore),
            semaphore_type: SemaphoreType::BINARY,
        })
    }

    pub fn try_new_timeline(logical_device: &Rc<LogicalDeviceGuard>, initial_value: u64) -> Result<Self> {
        let create_info = timeline_create_info(initial_value);
        let semaphore = unsafe { logical_device.create_semaphore(create_info.head(), None) }?;
        Ok(Self {
            semaphore: Guard::new(logical_device, semaphore),
            semaphore_type: SemaphoreType::TIMELINE,
        })
    }

    pub fn semaphore_type(&self) -> SemaphoreType {
        self.semaphore_type
    }

    /// Current counter of a timeline semaphore.
    pub fn value(&self) -> Result<u64> {
        Ok(unsafe {
            self.semaphore
                .parent()
                .get_semaphore_counter_value(*self.semaphore)
        }?)
    }

    pub fn signal(&self, value: u64) -> Result<()> {
        let signal_info = SemaphoreSignalInfo::builder()
            .semaphore(*self.semaphore)
            .value(value);
        Ok(unsafe { self.semaphore.parent().signal_semaphore(&signal_info) }?)
    }

    /// Blocks until a timeline semaphore reaches `value`.
    pub fn wait(&self, value: u64, timeout: u64) -> Result<()> {
        let semaphores = [*self.semaphore];
        let values = [value];
        let wait_info = SemaphoreWaitInfo::builder()
            .semaphores(&semaphores)
            .values(&values);
        Ok(unsafe { self.semaphore.parent().wait_semaphores(&wait_info, timeout) }?)
    }
}

fn timeline_create_info(
    initial_value: u64,
) -> std::pin::Pin<Box<StructureChain<ChainOf![SemaphoreCreateInfo, SemaphoreTypeCreateInfo]>>> {
    StructureChain::new(chain![
        SemaphoreCreateInfo::default(),
        SemaphoreTypeCreateInfo {
            semaphore_type: SemaphoreType::TIMELINE,
            initial_value,
            ..Default::default()
        },
    ])
}

impl Deref for SemaphoreGuard {
    type Target = Semaphore;

    fn deref(&self) -> &Self::Target {
        &self.semaphore
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::c_void;

    use ash::vk::StructureType;

    use super::*;

    #[test]
    fn timeline_info_links_the_type_info() {
        let chain = timeline_create_info(5);
        let head = chain.head();

        assert_eq!(head.s_type, StructureType::SEMAPHORE_CREATE_INFO);
        assert_eq!(
            head.p_next,
            chain.at::<1>() as *const SemaphoreTypeCreateInfo as *const c_void
        );
        let timeline = chain.get::<SemaphoreTypeCreateInfo, _>();
        assert_eq!(timeline.s_type, StructureType::SEMAPHORE_TYPE_CREATE_INFO);
        assert_eq!(timeline.semaphore_type, SemaphoreType::TIMELINE);
        assert_eq!(timeline.initial_value, 5);
        assert!(timeline.p_next.is_null());
    }
}
