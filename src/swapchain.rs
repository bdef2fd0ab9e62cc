use std::rc::Rc;

use anyhow::{anyhow, Result};
use ash::{
    extensions::khr::Swapchain,
    vk::{
        self, ColorSpaceKHR, CompositeAlphaFlagsKHR, Extent2D, Format, ImageAspectFlags,
        ImageUsageFlags, PresentModeKHR, SharingMode, SurfaceCapabilitiesKHR, SurfaceFormatKHR,
        SwapchainCreateInfoKHR, SwapchainKHR,
    },
};
use tracing::debug;

use crate::{
    physical_device::QueueFamilyIndices, ImageViewGuard, LogicalDeviceGuard, PNext, SurfaceGuard,
};

pub struct SwapchainSupportDetails {
    pub capabilities: SurfaceCapabilitiesKHR,
    pub formats: Vec<SurfaceFormatKHR>,
    pub present_modes: Vec<PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(surface: &SurfaceGuard, device: vk::PhysicalDevice) -> Result<Self> {
        Ok(Self {
            capabilities: surface.get_capabilities(device)?,
            formats: surface.get_surface_formats(device)?,
            present_modes: surface.get_presentation_modes(device)?,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// sRGB BGRA when offered, otherwise whatever the surface lists first.
    pub fn choose_format(&self) -> Result<SurfaceFormatKHR> {
        self.formats
            .iter()
            .find(|format| {
                format.format == Format::B8G8R8A8_SRGB
                    && format.color_space == ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| self.formats.first())
            .copied()
            .ok_or(anyhow!("No available surface formats!"))
    }

    /// `preferred` when offered, otherwise FIFO, which every surface supports.
    pub fn choose_present_mode(&self, preferred: PresentModeKHR) -> PresentModeKHR {
        if self.present_modes.contains(&preferred) {
            preferred
        } else {
            PresentModeKHR::FIFO
        }
    }

    /// The surface's own extent, or the framebuffer size clamped to the
    /// surface limits when the surface leaves it to us.
    pub fn choose_extent(&self, framebuffer_size: (i32, i32)) -> Result<Extent2D> {
        let capabilities = &self.capabilities;
        if capabilities.current_extent.width != u32::MAX {
            return Ok(capabilities.current_extent);
        }
        let (width, height) = framebuffer_size;
        let width = u32::try_from(width)?;
        let height = u32::try_from(height)?;
        Ok(Extent2D {
            width: width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        })
    }

    /// One more than the minimum, within the maximum when there is one.
    pub fn image_count(&self) -> u32 {
        let capabilities = &self.capabilities;
        let image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count.clamp(capabilities.min_image_count, capabilities.max_image_count)
        } else {
            image_count
        }
    }
}

pub struct SwapchainBuilder {
    framebuffer_size: (i32, i32),
    present_mode: PresentModeKHR,
    image_usage: ImageUsageFlags,
    old_swapchain: SwapchainKHR,
    next: PNext,
}

impl Default for SwapchainBuilder {
    fn default() -> Self {
        Self {
            framebuffer_size: (0, 0),
            present_mode: PresentModeKHR::MAILBOX,
            image_usage: ImageUsageFlags::COLOR_ATTACHMENT,
            old_swapchain: SwapchainKHR::null(),
            next: PNext::default(),
        }
    }
}

impl SwapchainBuilder {
    /// Used when the surface does not dictate the extent.
    pub fn framebuffer_size(mut self, framebuffer_size: (i32, i32)) -> Self {
        self.framebuffer_size = framebuffer_size;
        self
    }

    pub fn present_mode(mut self, present_mode: PresentModeKHR) -> Self {
        self.present_mode = present_mode;
        self
    }

    pub fn image_usage(mut self, image_usage: ImageUsageFlags) -> Self {
        self.image_usage = image_usage;
        self
    }

    pub fn old_swapchain(mut self, old_swapchain: SwapchainKHR) -> Self {
        self.old_swapchain = old_swapchain;
        self
    }

    pub fn next(mut self, next: impl Into<PNext>) -> Self {
        self.next = next.into();
        self
    }

    pub fn with_create_info<R>(
        &self,
        surface: vk::SurfaceKHR,
        support: &SwapchainSupportDetails,
        queue_families: QueueFamilyIndices,
        f: impl FnOnce(&SwapchainCreateInfoKHR) -> R,
    ) -> Result<R> {
        let surface_format = support.choose_format()?;
        let extent = support.choose_extent(self.framebuffer_size)?;
        let queue_family_indices = queue_families.unique();
        let graphics_and_present_queues_are_same = queue_family_indices.len() == 1;

        let mut create_info = SwapchainCreateInfoKHR::builder()
            // ignore alpha channel
            .composite_alpha(CompositeAlphaFlagsKHR::OPAQUE)
            // discard pixels hidden by other windows
            .clipped(true)
            .image_array_layers(1)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_format(surface_format.format)
            .image_sharing_mode(match graphics_and_present_queues_are_same {
                true => SharingMode::EXCLUSIVE,
                false => SharingMode::CONCURRENT,
            })
            .image_usage(self.image_usage)
            .min_image_count(support.image_count())
            .pre_transform(support.capabilities.current_transform)
            .present_mode(support.choose_present_mode(self.present_mode))
            .queue_family_indices(match graphics_and_present_queues_are_same {
                true => &[],
                false => queue_family_indices.as_slice(),
            })
            .surface(surface)
            .old_swapchain(self.old_swapchain)
            .build();
        create_info.p_next = self.next.value();

        Ok(f(&create_info))
    }

    pub fn build(
        self,
        device: &Rc<LogicalDeviceGuard>,
        surface: &Rc<SurfaceGuard>,
    ) -> Result<SwapchainGuard> {
        let support = SwapchainSupportDetails::query(surface, device.physical_device())?;
        let swapchain = Swapchain::new(device.instance(), device);
        let (handle, format, extent) = self.with_create_info(
            surface.handle(),
            &support,
            device.queue_families(),
            |create_info| {
                let handle = unsafe { swapchain.create_swapchain(create_info, None) };
                (
                    handle,
                    SurfaceFormatKHR {
                        format: create_info.image_format,
                        color_space: create_info.image_color_space,
                    },
                    create_info.image_extent,
                )
            },
        )?;
        let handle = handle?;
        debug!(
            "Swapchain created: {}x{} {:?}",
            extent.width, extent.height, format.format
        );

        let mut guard = SwapchainGuard {
            swapchain,
            handle,
            format,
            extent,
            images: vec![],
            image_views: vec![],
            surface: Rc::clone(surface),
            device: Rc::clone(device),
        };
        guard.images = unsafe { guard.swapchain.get_swapchain_images(handle) }?;
        guard.image_views = guard
            .images
            .iter()
            .map(|image| {
                ImageViewGuard::try_new(device, *image, format.format, ImageAspectFlags::COLOR)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(guard)
    }
}

/// RAII for a swapchain and the views of its images
pub struct SwapchainGuard {
    swapchain: Swapchain,
    handle: SwapchainKHR,
    format: SurfaceFormatKHR,
    extent: Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<ImageViewGuard>,
    // need to keep a reference to the surface and device to ensure we get dropped before them
    surface: Rc<SurfaceGuard>,
    device: Rc<LogicalDeviceGuard>,
}

impl SwapchainGuard {
    pub fn handle(&self) -> SwapchainKHR {
        self.handle
    }

    pub fn format(&self) -> SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[ImageViewGuard] {
        &self.image_views
    }

    /// Index of the next image to render to, or `None` when the swapchain is
    /// out of date and has to be recreated.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        fence: vk::Fence,
        timeout: u64,
    ) -> Result<Option<u32>> {
        match unsafe {
            self.swapchain
                .acquire_next_image(self.handle, timeout, semaphore, fence)
        } {
            Ok((image_index, _suboptimal)) => Ok(Some(image_index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Queues `image_index` for presentation. Returns true when the swapchain
    /// should be recreated.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool> {
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        match unsafe { self.swapchain.queue_present(queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(error) => Err(error.into()),
        }
    }

    /// Builds a replacement that hands this swapchain over as the old one.
    pub fn recreate(&self, framebuffer_size: (i32, i32)) -> Result<SwapchainGuard> {
        self.device.wait_idle()?;
        SwapchainBuilder::default()
            .framebuffer_size(framebuffer_size)
            .old_swapchain(self.handle)
            .build(&self.device, &self.surface)
    }
}

impl Drop for SwapchainGuard {
    fn drop(&mut self) {
        debug!("Dropping SwapchainGuard");
        // views first, they refer to the swapchain images
        self.image_views.clear();
        unsafe { self.swapchain.destroy_swapchain(self.handle, None) }
    }
}
