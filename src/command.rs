use std::{ops::Deref, rc::Rc};

use anyhow::{anyhow, Result};
use ash::vk::{
    CommandBuffer, CommandBufferAllocateInfo, CommandBufferBeginInfo, CommandBufferLevel,
    CommandBufferResetFlags, CommandBufferUsageFlags, CommandPool, CommandPoolCreateFlags,
    CommandPoolCreateInfo, CommandPoolResetFlags,
};
use tracing::debug;

use crate::{Guard, LogicalDeviceGuard};

/// RAII for CommandPool
pub struct CommandPoolGuard {
    command_pool: Guard<CommandPool, LogicalDeviceGuard>,
}

impl CommandPoolGuard {
    pub fn try_new(
        logical_device: &Rc<LogicalDeviceGuard>,
        queue_family_index: u32,
        flags: CommandPoolCreateFlags,
    ) -> Result<Rc<Self>> {
        let command_pool_create_info = CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family_index);
        let command_pool =
            unsafe { logical_device.create_command_pool(&command_pool_create_info, None) }?;
        debug!("Command pool created for queue family {}", queue_family_index);
        Ok(Rc::new(Self {
            command_pool: Guard::new(logical_device, command_pool),
        }))
    }

    pub fn logical_device(&self) -> &Rc<LogicalDeviceGuard> {
        self.command_pool.parent()
    }

    /// Allocates `count` buffers that go back to this pool when dropped.
    pub fn allocate(
        self: &Rc<Self>,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<CommandBuffers> {
        let command_buffer_allocate_info = CommandBufferAllocateInfo::builder()
            .command_pool(*self.command_pool)
            .level(level)
            .command_buffer_count(count);
        let command_buffers = unsafe {
            self.logical_device()
                .allocate_command_buffers(&command_buffer_allocate_info)
        }?;
        Ok(CommandBuffers {
            command_buffers,
            command_pool: Rc::clone(self),
        })
    }

    pub fn reset(&self) -> Result<()> {
        Ok(unsafe {
            self.logical_device()
                .reset_command_pool(*self.command_pool, CommandPoolResetFlags::empty())
        }?)
    }
}

impl Deref for CommandPoolGuard {
    type Target = CommandPool;

    fn deref(&self) -> &Self::Target {
        &self.command_pool
    }
}

/// Command buffers owned together, freed back to their pool on drop.
pub struct CommandBuffers {
    command_buffers: Vec<CommandBuffer>,
    // the pool has to outlive its buffers
    command_pool: Rc<CommandPoolGuard>,
}

impl CommandBuffers {
    fn get(&self, index: usize) -> Result<CommandBuffer> {
        self.command_buffers
            .get(index)
            .copied()
            .ok_or(anyhow!("no command buffer at index {}", index))
    }

    pub fn begin(&self, index: usize, flags: CommandBufferUsageFlags) -> Result<CommandBuffer> {
        let command_buffer = self.get(index)?;
        let begin_info = CommandBufferBeginInfo::builder().flags(flags);
        unsafe {
            self.command_pool
                .logical_device()
                .begin_command_buffer(command_buffer, &begin_info)
        }?;
        Ok(command_buffer)
    }

    pub fn end(&self, index: usize) -> Result<()> {
        let command_buffer = self.get(index)?;
        Ok(unsafe {
            self.command_pool
                .logical_device()
                .end_command_buffer(command_buffer)
        }?)
    }

    /// Needs a pool created with `RESET_COMMAND_BUFFER`.
    pub fn reset(&self, index: usize) -> Result<()> {
        let command_buffer = self.get(index)?;
        Ok(unsafe {
            self.command_pool
                .logical_device()
                .reset_command_buffer(command_buffer, CommandBufferResetFlags::empty())
        }?)
    }
}

impl Deref for CommandBuffers {
    type Target = [CommandBuffer];

    fn deref(&self) -> &Self::Target {
        &self.command_buffers
    }
}

impl Drop for CommandBuffers {
    fn drop(&mut self) {
        debug!("Freeing {} command buffers", self.command_buffers.len());
        if self.command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.command_pool
                .logical_device()
                .free_command_buffers(*self.command_pool.command_pool, &self.command_buffers)
        }
    }
}
