use std::{fmt, ops::Deref, rc::Rc};

use ash::vk::Handle;

/// A parent object that can destroy handles of type `H` it created.
pub trait Destroy<H> {
    fn destroy(&self, handle: H);
}

/// RAII for a single Vulkan handle owned by `P`.
///
/// Holds a reference to the parent so the parent is always dropped after
/// the handle. A null handle is never handed to `destroy`.
pub struct Guard<H: Handle + Copy, P: Destroy<H>> {
    handle: H,
    parent: Rc<P>,
}

impl<H: Handle + Copy, P: Destroy<H>> Guard<H, P> {
    pub fn new(parent: &Rc<P>, handle: H) -> Self {
        Self {
            handle,
            parent: Rc::clone(parent),
        }
    }

    pub fn handle(&self) -> H {
        self.handle
    }

    pub fn parent(&self) -> &Rc<P> {
        &self.parent
    }

    pub fn is_null(&self) -> bool {
        self.handle.as_raw() == 0
    }

    /// Gives up ownership of the handle. The guard is left null, so dropping
    /// it destroys nothing.
    pub fn release(mut self) -> H {
        std::mem::replace(&mut self.handle, H::from_raw(0))
    }
}

impl<H: Handle + Copy, P: Destroy<H>> Drop for Guard<H, P> {
    fn drop(&mut self) {
        if !self.is_null() {
            self.parent.destroy(self.handle);
        }
    }
}

impl<H: Handle + Copy, P: Destroy<H>> Deref for Guard<H, P> {
    type Target = H;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<H: Handle + Copy + fmt::Debug, P: Destroy<H>> fmt::Debug for Guard<H, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guard").field(&self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use ash::vk::{self, Handle};

    use super::*;

    #[derive(Default)]
    struct RecordingParent {
        destroyed: RefCell<Vec<u64>>,
    }

    impl Destroy<vk::Fence> for RecordingParent {
        fn destroy(&self, handle: vk::Fence) {
            self.destroyed.borrow_mut().push(handle.as_raw());
        }
    }

    impl Destroy<vk::Semaphore> for RecordingParent {
        fn destroy(&self, handle: vk::Semaphore) {
            self.destroyed.borrow_mut().push(handle.as_raw() + 1000);
        }
    }

    #[test]
    fn dropping_destroys_the_handle_once() {
        let parent = Rc::new(RecordingParent::default());
        let fence = Guard::new(&parent, vk::Fence::from_raw(42));
        assert_eq!(Rc::strong_count(&parent), 2);
        assert_eq!(*fence, vk::Fence::from_raw(42));

        drop(fence);

        assert_eq!(*parent.destroyed.borrow(), vec![42]);
        assert_eq!(Rc::strong_count(&parent), 1);
    }

    #[test]
    fn null_handles_are_not_destroyed() {
        let parent = Rc::new(RecordingParent::default());
        let fence = Guard::new(&parent, vk::Fence::null());
        assert!(fence.is_null());

        drop(fence);

        assert!(parent.destroyed.borrow().is_empty());
    }

    #[test]
    fn released_handle_is_left_to_the_caller() {
        let parent = Rc::new(RecordingParent::default());
        let fence = Guard::new(&parent, vk::Fence::from_raw(7));

        let raw = fence.release();

        assert_eq!(raw, vk::Fence::from_raw(7));
        assert!(parent.destroyed.borrow().is_empty());
        assert_eq!(Rc::strong_count(&parent), 1);
    }

    #[test]
    fn one_parent_destroys_several_handle_types() {
        let parent = Rc::new(RecordingParent::default());
        {
            let _fence = Guard::new(&parent, vk::Fence::from_raw(1));
            let _semaphore = Guard::new(&parent, vk::Semaphore::from_raw(2));
        }
        // locals drop in reverse declaration order
        assert_eq!(*parent.destroyed.borrow(), vec![1002, 1]);
    }
}
