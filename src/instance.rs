use std::{ffi::CString, ops::Deref, rc::Rc};

use anyhow::Result;
use ash::{
    extensions::ext::DebugUtils,
    vk::{self, make_api_version, ApplicationInfo, InstanceCreateInfo, API_VERSION_1_3},
    Entry,
};
use tracing::debug;

use crate::{debug_utils::messenger_create_info, PNext, StructureChain};

const API_VERSION: u32 = API_VERSION_1_3;
pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

#[cfg(feature = "enable_validations")]
pub const ENABLE_VALIDATIONS: bool = true;
#[cfg(not(feature = "enable_validations"))]
pub const ENABLE_VALIDATIONS: bool = false;

/// Collects everything needed to create an [`InstanceGuard`].
pub struct InstanceBuilder {
    application_name: String,
    application_version: u32,
    extensions: Vec<String>,
    layers: Vec<String>,
    validation: bool,
    next: PNext,
}

impl Default for InstanceBuilder {
    fn default() -> Self {
        let version_major = env!("CARGO_PKG_VERSION_MAJOR").parse::<u32>().unwrap_or(0);
        let version_minor = env!("CARGO_PKG_VERSION_MINOR").parse::<u32>().unwrap_or(0);
        let version_patch = env!("CARGO_PKG_VERSION_PATCH").parse::<u32>().unwrap_or(0);
        Self {
            application_name: env!("CARGO_PKG_NAME").to_owned(),
            application_version: make_api_version(0, version_major, version_minor, version_patch),
            extensions: vec![],
            layers: vec![],
            validation: false,
            next: PNext::default(),
        }
    }
}

impl InstanceBuilder {
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn application_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = make_api_version(0, major, minor, patch);
        self
    }

    pub fn extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn layers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers.extend(names.into_iter().map(Into::into));
        self
    }

    /// Enables the Khronos validation layer, the debug utils extension and a
    /// messenger covering instance creation itself.
    pub fn validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }

    /// Extension structures to chain onto `VkInstanceCreateInfo`.
    pub fn next(mut self, next: impl Into<PNext>) -> Self {
        self.next = next.into();
        self
    }

    fn enabled_extensions(&self) -> Result<Vec<CString>> {
        let mut names = self.extensions.clone();
        if self.validation {
            names.push(DebugUtils::name().to_str()?.to_owned());
        }
        names.sort();
        names.dedup();
        debug!("Instance extensions to enable: {}", names.join(", "));
        Ok(names
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?)
    }

    fn enabled_layers(&self) -> Result<Vec<CString>> {
        let mut names = self.layers.clone();
        if self.validation {
            names.push(VALIDATION_LAYER.to_owned());
        }
        names.dedup();
        debug!("Layers to enable: {}", names.join(", "));
        Ok(names
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Assembles the create info and hands it to `f`. Everything it points at
    /// lives until `f` returns.
    pub fn with_create_info<R>(&self, f: impl FnOnce(&InstanceCreateInfo) -> R) -> Result<R> {
        let application_name = CString::new(self.application_name.as_str())?;
        let application_info = ApplicationInfo::builder()
            .application_name(&application_name)
            .application_version(self.application_version)
            .engine_name(&application_name)
            .engine_version(self.application_version)
            .api_version(API_VERSION);

        let extensions = self.enabled_extensions()?;
        let extension_ptrs = extensions
            .iter()
            .map(|extension| extension.as_ptr())
            .collect::<Vec<_>>();
        let layers = self.enabled_layers()?;
        let layer_ptrs = layers.iter().map(|layer| layer.as_ptr()).collect::<Vec<_>>();

        // with validation on, the messenger goes in front of the caller's chain
        let messenger = self.validation.then(|| {
            StructureChain::new(chain![vk::DebugUtilsMessengerCreateInfoEXT {
                p_next: self.next.value(),
                ..messenger_create_info()
            }])
        });
        let p_next = match &messenger {
            Some(messenger) => messenger.as_ptr(),
            None => self.next.value(),
        };

        let mut create_info = InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .build();
        create_info.p_next = p_next;

        Ok(f(&create_info))
    }

    pub fn build(self, entry: &Entry) -> Result<Rc<InstanceGuard>> {
        let instance = self.with_create_info(|create_info| unsafe {
            entry.create_instance(create_info, None)
        })??;
        debug!("Instance created for {}", self.application_name);
        Ok(Rc::new(InstanceGuard {
            instance,
            entry: entry.clone(),
            validation: self.validation,
        }))
    }
}

/// RAII for Instance
pub struct InstanceGuard {
    instance: ash::Instance,
    entry: Entry,
    validation: bool,
}

impl InstanceGuard {
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation
    }
}

impl Deref for InstanceGuard {
    type Target = ash::Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        debug!("Dropping InstanceGuard");
        unsafe { self.instance.destroy_instance(None) }
    }
}
