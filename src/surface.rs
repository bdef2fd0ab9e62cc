use std::{mem::MaybeUninit, ops::Deref, ptr, rc::Rc};

use anyhow::Result;
use ash::{
    extensions::khr::Surface,
    vk::{Handle, PhysicalDevice, PresentModeKHR, SurfaceCapabilitiesKHR, SurfaceFormatKHR, SurfaceKHR},
};
use glfw::PWindow;
use tracing::debug;

use crate::InstanceGuard;

/// RAII for Surface
pub struct SurfaceGuard {
    surface: Surface,
    handle: SurfaceKHR,
    // need to keep a reference to instance to ensure we get dropped before it
    instance: Rc<InstanceGuard>,
}

impl SurfaceGuard {
    pub fn try_new(instance: &Rc<InstanceGuard>, window: &PWindow) -> Result<Rc<Self>> {
        let mut handle: MaybeUninit<SurfaceKHR> = MaybeUninit::uninit();
        window
            .create_window_surface(instance.handle(), ptr::null(), handle.as_mut_ptr())
            .result()?;
        let handle = unsafe { handle.assume_init() };
        debug!("Surface created: {:#x}", handle.as_raw());
        let surface = Surface::new(instance.entry(), instance);
        Ok(Rc::new(Self {
            surface,
            handle,
            instance: Rc::clone(instance),
        }))
    }

    pub fn handle(&self) -> SurfaceKHR {
        self.handle
    }

    pub fn instance(&self) -> &Rc<InstanceGuard> {
        &self.instance
    }

    pub fn get_capabilities(&self, device: PhysicalDevice) -> Result<SurfaceCapabilitiesKHR> {
        Ok(unsafe {
            self.surface
                .get_physical_device_surface_capabilities(device, self.handle)
        }?)
    }

    pub fn get_surface_formats(&self, device: PhysicalDevice) -> Result<Vec<SurfaceFormatKHR>> {
        Ok(unsafe {
            self.surface
                .get_physical_device_surface_formats(device, self.handle)
        }?)
    }

    pub fn get_presentation_modes(&self, device: PhysicalDevice) -> Result<Vec<PresentModeKHR>> {
        Ok(unsafe {
            self.surface
                .get_physical_device_surface_present_modes(device, self.handle)
        }?)
    }

    pub fn get_physical_device_surface_support(
        &self,
        device: PhysicalDevice,
        index: u32,
    ) -> Result<bool> {
        Ok(unsafe {
            self.surface
                .get_physical_device_surface_support(device, index, self.handle)
        }?)
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        debug!("Dropping SurfaceGuard");
        unsafe { self.surface.destroy_surface(self.handle, None) }
    }
}

impl Deref for SurfaceGuard {
    type Target = SurfaceKHR;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}
