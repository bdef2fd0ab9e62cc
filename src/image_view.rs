use std::{ops::Deref, rc::Rc};

use anyhow::Result;
use ash::vk::{
    ComponentMapping, ComponentSwizzle, Format, Image, ImageAspectFlags, ImageSubresourceRange,
    ImageView, ImageViewCreateInfo, ImageViewType, Sampler, SamplerCreateInfo,
};

use crate::{Guard, LogicalDeviceGuard};

/// 2D view over the first mip level and layer of `image`.
pub(crate) fn image_view_create_info(
    image: Image,
    format: Format,
    aspect_mask: ImageAspectFlags,
) -> ImageViewCreateInfo {
    ImageViewCreateInfo::builder()
        .image(image)
        .view_type(ImageViewType::TYPE_2D)
        .format(format)
        .components(ComponentMapping {
            r: ComponentSwizzle::IDENTITY,
            g: ComponentSwizzle::IDENTITY,
            b: ComponentSwizzle::IDENTITY,
            a: ComponentSwizzle::IDENTITY,
        })
        .subresource_range(ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()
}

/// RAII for ImageView
pub struct ImageViewGuard {
    image_view: Guard<ImageView, LogicalDeviceGuard>,
}

impl ImageViewGuard {
    pub fn try_new(
        logical_device: &Rc<LogicalDeviceGuard>,
        image: Image,
        format: Format,
        aspect_mask: ImageAspectFlags,
    ) -> Result<Self> {
        let create_info = image_view_create_info(image, format, aspect_mask);
        let image_view = unsafe { logical_device.create_image_view(&create_info, None) }?;
        Ok(Self {
            image_view: Guard::new(logical_device, image_view),
        })
    }
}

impl Deref for ImageViewGuard {
    type Target = ImageView;

    fn deref(&self) -> &Self::Target {
        &self.image_view
    }
}

/// RAII for Sampler
pub struct SamplerGuard {
    sampler: Guard<Sampler, LogicalDeviceGuard>,
}

impl SamplerGuard {
    pub fn try_new(
        logical_device: &Rc<LogicalDeviceGuard>,
        create_info: &SamplerCreateInfo,
    ) -> Result<Self> {
        let sampler = unsafe { logical_device.create_sampler(create_info, None) }?;
        Ok(Self {
            sampler: Guard::new(logical_device, sampler),
        })
    }
}

impl Deref for SamplerGuard {
    type Target = Sampler;

    fn deref(&self) -> &Self::Target {
        &self.sampler
    }
}
