use std::rc::Rc;

use anyhow::{bail, Result};
use ash::{
    extensions::ext::DebugUtils,
    vk::{
        DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
        DebugUtilsMessengerCreateInfoEXT, DebugUtilsMessengerEXT,
    },
};
use tracing::debug;

use crate::{logging::vulkan_debug_utils_callback, InstanceGuard};

/// Messenger settings routing every severity and type into `tracing`.
pub fn messenger_create_info() -> DebugUtilsMessengerCreateInfoEXT {
    DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            DebugUtilsMessageSeverityFlagsEXT::ERROR
                | DebugUtilsMessageSeverityFlagsEXT::WARNING
                | DebugUtilsMessageSeverityFlagsEXT::INFO
                | DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        )
        .message_type(
            DebugUtilsMessageTypeFlagsEXT::GENERAL
                | DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                | DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        )
        .pfn_user_callback(Some(vulkan_debug_utils_callback))
        .build()
}

/// RAII for the debug utils messenger
pub struct DebugUtilsGuard {
    debug_utils: DebugUtils,
    messenger: DebugUtilsMessengerEXT,
    // need to keep a reference to instance to ensure we get dropped before instance does
    _instance: Rc<InstanceGuard>,
}

impl DebugUtilsGuard {
    pub fn try_new(instance: &Rc<InstanceGuard>) -> Result<Self> {
        if !instance.validation_enabled() {
            bail!("debug utils messenger needs an instance built with validation enabled");
        }
        let debug_utils = DebugUtils::new(instance.entry(), instance);
        let messenger =
            unsafe { debug_utils.create_debug_utils_messenger(&messenger_create_info(), None)? };
        Ok(Self {
            debug_utils,
            messenger,
            _instance: Rc::clone(instance),
        })
    }

    pub fn handle(&self) -> DebugUtilsMessengerEXT {
        self.messenger
    }
}

impl Drop for DebugUtilsGuard {
    fn drop(&mut self) {
        debug!("Dropping DebugUtilsGuard");
        unsafe {
            self.debug_utils
                .destroy_debug_utils_messenger(self.messenger, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::StructureType;

    use super::*;

    #[test]
    fn messenger_listens_to_everything() {
        let create_info = messenger_create_info();

        assert_eq!(
            create_info.s_type,
            StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT
        );
        assert!(create_info.p_next.is_null());
        assert!(create_info
            .message_severity
            .contains(DebugUtilsMessageSeverityFlagsEXT::VERBOSE | DebugUtilsMessageSeverityFlagsEXT::ERROR));
        assert!(create_info
            .message_type
            .contains(DebugUtilsMessageTypeFlagsEXT::VALIDATION));
        assert!(create_info.pfn_user_callback.is_some());
    }
}
