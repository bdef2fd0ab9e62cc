use std::ffi::CStr;

use anyhow::Result;
use ash::vk::{
    Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
    DebugUtilsMessengerCallbackDataEXT,
};
use simple_logger::{set_up_color_terminal, SimpleLogger};
use tracing::{event, Level};

/// Installs the terminal logger. `RUST_LOG` overrides the default level.
pub fn init_logging() -> Result<()> {
    set_up_color_terminal();
    let logger = SimpleLogger::new().env();
    logger.init()?;
    Ok(())
}

/// Maps a validation message severity onto a tracing level.
pub(crate) fn severity_level(message_severity: DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::INFO
    } else {
        Level::TRACE
    }
}

pub(crate) unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: DebugUtilsMessageSeverityFlagsEXT,
    message_type: DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return ash::vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();
    let ty = format!("{:?}", message_type).to_lowercase();

    // event! needs a constant level
    match severity_level(message_severity) {
        Level::ERROR => event!(Level::ERROR, message = %message, ty = ty),
        Level::WARN => event!(Level::WARN, message = %message, ty = ty),
        Level::INFO => event!(Level::INFO, message = %message, ty = ty),
        _ => event!(Level::TRACE, message = %message, ty = ty),
    }
    // dont skip driver
    ash::vk::FALSE
}
