use std::{ptr, rc::Rc};

use anyhow::{bail, Result};
use ash::vk::{
    self, BufferCreateInfo, BufferUsageFlags, Extent2D, Extent3D, Format, ImageAspectFlags,
    ImageCreateInfo, ImageLayout, ImageTiling, ImageType, ImageUsageFlags, MemoryPropertyFlags,
    SampleCountFlags, SharingMode,
};
use bytemuck::Pod;
use tracing::debug;
use vk_mem::{Alloc, AllocationCreateFlags, AllocationCreateInfo, MemoryUsage};

use crate::{ImageViewGuard, LogicalDeviceGuard};

/// Where an allocation lives and how the host gets at it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Device local, never mapped.
    #[default]
    GpuOnly,
    /// Host visible, written sequentially by the host: staging and per frame uniforms.
    CpuToGpu,
    /// Host visible and preferably cached, for readbacks.
    GpuToCpu,
}

impl MemoryLocation {
    pub fn is_host_visible(self) -> bool {
        !matches!(self, MemoryLocation::GpuOnly)
    }

    pub(crate) fn allocation_create_info(self) -> AllocationCreateInfo {
        let host_visible = MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT;
        match self {
            MemoryLocation::GpuOnly => AllocationCreateInfo {
                usage: MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            MemoryLocation::CpuToGpu => AllocationCreateInfo {
                usage: MemoryUsage::Auto,
                flags: AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                required_flags: host_visible,
                ..Default::default()
            },
            MemoryLocation::GpuToCpu => AllocationCreateInfo {
                usage: MemoryUsage::AutoPreferHost,
                flags: AllocationCreateFlags::HOST_ACCESS_RANDOM,
                required_flags: host_visible,
                preferred_flags: MemoryPropertyFlags::HOST_CACHED,
                ..Default::default()
            },
        }
    }
}

/// RAII for the memory allocator of a device
pub struct AllocatorGuard {
    allocator: vk_mem::Allocator,
    // need to keep a reference to the device to ensure we get dropped before it
    logical_device: Rc<LogicalDeviceGuard>,
}

impl AllocatorGuard {
    pub fn try_new(logical_device: &Rc<LogicalDeviceGuard>) -> Result<Rc<Self>> {
        let instance: &ash::Instance = logical_device.instance();
        let device: &ash::Device = logical_device;
        let allocator = vk_mem::Allocator::new(vk_mem::AllocatorCreateInfo::new(
            instance,
            device,
            logical_device.physical_device(),
        ))?;
        debug!("Allocator created");
        Ok(Rc::new(Self {
            allocator,
            logical_device: Rc::clone(logical_device),
        }))
    }

    pub fn logical_device(&self) -> &Rc<LogicalDeviceGuard> {
        &self.logical_device
    }
}

impl Drop for AllocatorGuard {
    fn drop(&mut self) {
        debug!("Dropping AllocatorGuard");
    }
}

/// Checks that `len` bytes at `offset` fit in `size` and returns the offset as an index.
fn host_range(size: u64, offset: u64, len: usize) -> Result<usize> {
    let end = offset.checked_add(u64::try_from(len)?);
    match end {
        Some(end) if end <= size => Ok(usize::try_from(offset)?),
        _ => bail!(
            "{} bytes at offset {} do not fit in a {} byte buffer",
            len,
            offset,
            size
        ),
    }
}

pub struct BufferBuilder {
    size: u64,
    usage: BufferUsageFlags,
    location: MemoryLocation,
}

impl BufferBuilder {
    pub fn new(size: u64, usage: BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            location: MemoryLocation::default(),
        }
    }

    pub fn location(mut self, location: MemoryLocation) -> Self {
        self.location = location;
        self
    }

    fn create_info(&self) -> Result<BufferCreateInfo> {
        if self.size == 0 {
            bail!("buffers cannot be empty");
        }
        Ok(BufferCreateInfo::builder()
            .size(self.size)
            .usage(self.usage)
            .sharing_mode(SharingMode::EXCLUSIVE)
            .build())
    }

    pub fn build(self, allocator: &Rc<AllocatorGuard>) -> Result<BufferGuard> {
        let create_info = self.create_info()?;
        let (buffer, allocation) = unsafe {
            allocator
                .allocator
                .create_buffer(&create_info, &self.location.allocation_create_info())
        }?;
        debug!("Buffer of {} bytes created in {:?}", self.size, self.location);
        Ok(BufferGuard {
            buffer,
            allocation,
            size: self.size,
            location: self.location,
            allocator: Rc::clone(allocator),
        })
    }
}

/// RAII for a buffer and its memory
pub struct BufferGuard {
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: u64,
    location: MemoryLocation,
    allocator: Rc<AllocatorGuard>,
}

impl BufferGuard {
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copies `data` into the buffer at `offset` bytes.
    pub fn write<T: Pod>(&mut self, offset: u64, data: &[T]) -> Result<()> {
        if !self.location.is_host_visible() {
            bail!("buffer in {:?} memory cannot be written from the host", self.location);
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let start = host_range(self.size, offset, bytes.len())?;
        let allocator = &self.allocator.allocator;
        unsafe {
            let mapped = allocator.map_memory(&mut self.allocation)?;
            ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.add(start), bytes.len());
            allocator.unmap_memory(&mut self.allocation);
        }
        Ok(())
    }

    /// Copies the whole buffer back to the host.
    pub fn read(&mut self) -> Result<Vec<u8>> {
        if !self.location.is_host_visible() {
            bail!("buffer in {:?} memory cannot be read from the host", self.location);
        }
        let len = usize::try_from(self.size)?;
        let mut bytes = vec![0u8; len];
        let allocator = &self.allocator.allocator;
        unsafe {
            let mapped = allocator.map_memory(&mut self.allocation)?;
            ptr::copy_nonoverlapping(mapped.cast_const(), bytes.as_mut_ptr(), len);
            allocator.unmap_memory(&mut self.allocation);
        }
        Ok(bytes)
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        debug!("Dropping BufferGuard");
        unsafe {
            self.allocator
                .allocator
                .destroy_buffer(self.buffer, &mut self.allocation)
        }
    }
}

pub struct ImageBuilder {
    extent: Extent2D,
    format: Format,
    usage: ImageUsageFlags,
    aspect_mask: ImageAspectFlags,
    location: MemoryLocation,
}

impl ImageBuilder {
    pub fn new(extent: Extent2D, format: Format, usage: ImageUsageFlags) -> Self {
        let aspect_mask = match format {
            Format::D16_UNORM | Format::D32_SFLOAT | Format::X8_D24_UNORM_PACK32 => {
                ImageAspectFlags::DEPTH
            }
            Format::D16_UNORM_S8_UINT | Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT => {
                ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL
            }
            _ => ImageAspectFlags::COLOR,
        };
        Self {
            extent,
            format,
            usage,
            aspect_mask,
            location: MemoryLocation::GpuOnly,
        }
    }

    pub fn location(mut self, location: MemoryLocation) -> Self {
        self.location = location;
        self
    }

    fn create_info(&self) -> Result<ImageCreateInfo> {
        if self.extent.width == 0 || self.extent.height == 0 {
            bail!("images need a non zero extent");
        }
        Ok(ImageCreateInfo::builder()
            .image_type(ImageType::TYPE_2D)
            .format(self.format)
            .extent(Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(SampleCountFlags::TYPE_1)
            .tiling(ImageTiling::OPTIMAL)
            .usage(self.usage)
            .sharing_mode(SharingMode::EXCLUSIVE)
            .initial_layout(ImageLayout::UNDEFINED)
            .build())
    }

    /// Creates the image, its memory and a view over the whole image.
    pub fn build(self, allocator: &Rc<AllocatorGuard>) -> Result<ImageGuard> {
        let create_info = self.create_info()?;
        let (image, mut allocation) = unsafe {
            allocator
                .allocator
                .create_image(&create_info, &self.location.allocation_create_info())
        }?;
        let view = match ImageViewGuard::try_new(
            allocator.logical_device(),
            image,
            self.format,
            self.aspect_mask,
        ) {
            Ok(view) => view,
            Err(error) => {
                unsafe { allocator.allocator.destroy_image(image, &mut allocation) };
                return Err(error);
            }
        };
        debug!(
            "Image {}x{} {:?} created",
            self.extent.width, self.extent.height, self.format
        );
        Ok(ImageGuard {
            view: Some(view),
            image,
            allocation,
            extent: self.extent,
            format: self.format,
            allocator: Rc::clone(allocator),
        })
    }
}

/// RAII for an image, its memory and its view
pub struct ImageGuard {
    view: Option<ImageViewGuard>,
    image: vk::Image,
    allocation: vk_mem::Allocation,
    extent: Extent2D,
    format: Format,
    allocator: Rc<AllocatorGuard>,
}

impl ImageGuard {
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view.as_deref().copied().unwrap_or_default()
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

impl Drop for ImageGuard {
    fn drop(&mut self) {
        debug!("Dropping ImageGuard");
        // the view goes before the image it looks at
        self.view.take();
        unsafe {
            self.allocator
                .allocator
                .destroy_image(self.image, &mut self.allocation)
        }
    }
}
