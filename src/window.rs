use std::collections::HashMap;

use anyhow::{anyhow, Result};
use glfw::{
    fail_on_errors, Action, ClientApiHint, Glfw, GlfwReceiver, Key, PWindow, WindowEvent,
    WindowHint, WindowMode,
};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: env!("CARGO_PKG_NAME").to_owned(),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

/// Coarse kind of a window event, used to pick handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Key,
    FramebufferSize,
    Close,
    CursorPos,
    MouseButton,
    Scroll,
    Other,
}

impl EventKind {
    pub fn of(event: &WindowEvent) -> Self {
        match event {
            WindowEvent::Key(..) => EventKind::Key,
            WindowEvent::FramebufferSize(..) => EventKind::FramebufferSize,
            WindowEvent::Close => EventKind::Close,
            WindowEvent::CursorPos(..) => EventKind::CursorPos,
            WindowEvent::MouseButton(..) => EventKind::MouseButton,
            WindowEvent::Scroll(..) => EventKind::Scroll,
            _ => EventKind::Other,
        }
    }
}

type Handler = Box<dyn FnMut(&WindowEvent)>;

/// Calls the handlers registered for an event's kind, in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventDispatcher {
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&WindowEvent) + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Returns how many handlers saw the event.
    pub fn dispatch(&mut self, event: &WindowEvent) -> usize {
        let Some(handlers) = self.handlers.get_mut(&EventKind::of(event)) else {
            return 0;
        };
        for handler in handlers.iter_mut() {
            handler(event);
        }
        handlers.len()
    }
}

pub struct WindowManager {
    glfw: Glfw,
    window: PWindow,
    receiver: GlfwReceiver<(f64, WindowEvent)>,
    dispatcher: EventDispatcher,
    framebuffer_resized: bool,
}

impl WindowManager {
    pub fn try_new(config: &WindowConfig) -> Result<Self> {
        let mut glfw = glfw::init(fail_on_errors!())?;
        if !glfw.vulkan_supported() {
            return Err(anyhow!("GLFW found no Vulkan loader"));
        }
        // vulkan draws into the window, not OpenGL
        glfw.window_hint(WindowHint::ClientApi(ClientApiHint::NoApi));
        glfw.window_hint(WindowHint::Resizable(config.resizable));
        let (mut window, receiver) = glfw
            .create_window(config.width, config.height, &config.title, WindowMode::Windowed)
            .ok_or(anyhow!("Failed to create GLFW window"))?;

        window.set_key_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_close_polling(true);
        info!("Window {}x{} \"{}\" created", config.width, config.height, config.title);

        Ok(Self {
            glfw,
            window,
            receiver,
            dispatcher: EventDispatcher::default(),
            framebuffer_resized: false,
        })
    }

    pub fn window(&self) -> &PWindow {
        &self.window
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    /// Instance extensions GLFW needs to create surfaces.
    pub fn required_instance_extensions(&self) -> Result<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or(anyhow!("GLFW cannot create Vulkan surfaces here"))
    }

    pub fn framebuffer_size(&self) -> (i32, i32) {
        self.window.get_framebuffer_size()
    }

    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Handles pending events: escape closes the window, resizes are
    /// remembered, and everything goes through the dispatcher.
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.receiver) {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                WindowEvent::FramebufferSize(width, height) => {
                    debug!("Framebuffer resized to {}x{}", width, height);
                    self.framebuffer_resized = true;
                }
                _ => {}
            }
            self.dispatcher.dispatch(&event);
        }
    }

    /// True once after the framebuffer changed size.
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.framebuffer_resized)
    }

    /// Blocks while the window is minimised.
    pub fn wait_while_minimized(&mut self) {
        while !self.window.should_close() {
            let (width, height) = self.window.get_framebuffer_size();
            if width > 0 && height > 0 {
                break;
            }
            self.glfw.wait_events();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use glfw::{Modifiers, MouseButton};

    use super::*;

    #[test]
    fn events_reach_handlers_of_their_kind() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = EventDispatcher::default();
        {
            let seen = Rc::clone(&seen);
            dispatcher.on(EventKind::Key, move |event| {
                if let WindowEvent::Key(key, ..) = event {
                    seen.borrow_mut().push(format!("key {:?}", key));
                }
            });
        }
        {
            let seen = Rc::clone(&seen);
            dispatcher.on(EventKind::FramebufferSize, move |event| {
                if let WindowEvent::FramebufferSize(width, height) = event {
                    seen.borrow_mut().push(format!("resize {}x{}", width, height));
                }
            });
        }

        let key = WindowEvent::Key(Key::A, 0, Action::Press, Modifiers::empty());
        assert_eq!(dispatcher.dispatch(&key), 1);
        assert_eq!(dispatcher.dispatch(&WindowEvent::FramebufferSize(640, 480)), 1);
        assert_eq!(
            dispatcher.dispatch(&WindowEvent::MouseButton(
                MouseButton::Button1,
                Action::Press,
                Modifiers::empty()
            )),
            0
        );

        assert_eq!(*seen.borrow(), vec!["key A", "resize 640x480"]);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = EventDispatcher::default();
        for index in 0..3 {
            let order = Rc::clone(&order);
            dispatcher.on(EventKind::Close, move |_| order.borrow_mut().push(index));
        }

        assert_eq!(dispatcher.dispatch(&WindowEvent::Close), 3);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn event_kinds() {
        assert_eq!(EventKind::of(&WindowEvent::Scroll(0.0, 1.0)), EventKind::Scroll);
        assert_eq!(EventKind::of(&WindowEvent::CursorPos(1.0, 2.0)), EventKind::CursorPos);
        assert_eq!(EventKind::of(&WindowEvent::Focus(true)), EventKind::Other);
    }

    #[test]
    fn default_config() {
        let config = WindowConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.title, "vulkan_raii");
        assert!(config.resizable);
    }
}
