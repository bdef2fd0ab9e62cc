use std::{
    alloc::{self, Layout},
    ffi::c_void,
    fmt,
    pin::Pin,
    ptr::{self, NonNull},
};

use ash::vk;

use crate::structure_chain::{ChainList, StructureChain};

/// An owned, type-erased structure chain, ready to be used as a `p_next`.
///
/// Builders store one of these so they don't have to be generic over the
/// extension structures a caller wants to attach. Once erased, the chain can
/// only be forwarded to Vulkan; keep the typed [`StructureChain`] around if
/// the values need reading back.
///
/// ```
/// use ash::vk;
/// use vulkan_raii::{chain, PNext, StructureChain};
///
/// let next = PNext::from(StructureChain::new(chain![
///     vk::PhysicalDeviceVulkan12Features {
///         timeline_semaphore: vk::TRUE,
///         ..Default::default()
///     },
/// ]));
///
/// let mut create_info = vk::DeviceCreateInfo::default();
/// create_info.p_next = next.value();
/// assert!(!create_info.p_next.is_null());
/// ```
#[derive(Default)]
pub struct PNext {
    storage: Option<ErasedChain>,
}

struct ErasedChain {
    data: NonNull<u8>,
    layout: Layout,
    drop_elements: unsafe fn(*mut u8),
    contains_type: fn(vk::StructureType) -> bool,
}

unsafe fn drop_elements<L>(data: *mut u8) {
    ptr::drop_in_place(data.cast::<StructureChain<L>>());
}

impl PNext {
    /// Copies `chain` into a new allocation and links the copy where it lives.
    pub fn new<L: ChainList + Clone>(chain: &StructureChain<L>) -> Self {
        let elements = chain.elements().clone();
        let layout = Layout::new::<StructureChain<L>>();
        // SAFETY: a chain always holds at least one structure, so the layout is not zero sized
        let data = unsafe { alloc::alloc(layout) };
        let Some(data) = NonNull::new(data) else {
            alloc::handle_alloc_error(layout)
        };
        // SAFETY: freshly allocated with the layout of the chain; the allocation never moves
        unsafe {
            StructureChain::write_linked(data.as_ptr().cast(), elements);
        }
        Self {
            storage: Some(ErasedChain {
                data,
                layout,
                drop_elements: drop_elements::<L>,
                contains_type: L::contains_type,
            }),
        }
    }

    /// True when there is nothing to chain.
    pub fn is_empty(&self) -> bool {
        self.storage.is_none()
    }

    /// Pointer to the first structure, or null when empty.
    pub fn value(&self) -> *const c_void {
        self.storage
            .as_ref()
            .map_or(ptr::null(), |storage| storage.data.as_ptr().cast_const().cast())
    }

    /// True when one of the structures owned by this handle has `structure_type`.
    ///
    /// Whatever the last structure's `p_next` points at belongs to the caller
    /// and is not looked at.
    pub fn contains(&self, structure_type: vk::StructureType) -> bool {
        self.storage
            .as_ref()
            .is_some_and(|storage| (storage.contains_type)(structure_type))
    }

    /// Size in bytes of the erased chain.
    pub fn size(&self) -> usize {
        self.storage
            .as_ref()
            .map_or(0, |storage| storage.layout.size())
    }
}

impl<L: ChainList> From<Pin<Box<StructureChain<L>>>> for PNext {
    /// Takes over a pinned chain without moving it, so its links stay valid.
    fn from(chain: Pin<Box<StructureChain<L>>>) -> Self {
        let layout = Layout::new::<StructureChain<L>>();
        // SAFETY: the box is only turned into a raw pointer, the chain stays where it is
        let data = Box::into_raw(unsafe { Pin::into_inner_unchecked(chain) });
        Self {
            storage: Some(ErasedChain {
                // SAFETY: Box::into_raw never returns null
                data: unsafe { NonNull::new_unchecked(data.cast()) },
                layout,
                drop_elements: drop_elements::<L>,
                contains_type: L::contains_type,
            }),
        }
    }
}

impl Drop for ErasedChain {
    fn drop(&mut self) {
        // SAFETY: data holds one initialised chain allocated with self.layout
        unsafe {
            (self.drop_elements)(self.data.as_ptr());
            alloc::dealloc(self.data.as_ptr(), self.layout);
        }
    }
}

impl fmt::Debug for PNext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PNext")
            .field("value", &self.value())
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, mem::size_of};

    use ash::vk::StructureType;

    use super::*;
    use crate::{structure_chain::tests::Probe, structure_type::Linkable};

    #[test]
    fn default_handle_is_empty() {
        let next = PNext::default();
        assert!(next.is_empty());
        assert!(next.value().is_null());
        assert_eq!(next.size(), 0);
    }

    #[test]
    fn copy_exposes_the_same_head() {
        let chain = StructureChain::new(chain![
            vk::PhysicalDeviceFeatures2 {
                features: vk::PhysicalDeviceFeatures {
                    geometry_shader: vk::TRUE,
                    ..Default::default()
                },
                ..Default::default()
            },
            vk::PhysicalDeviceVulkan13Features::default(),
        ]);
        let next = PNext::new(&chain);

        assert!(!next.is_empty());
        assert_ne!(next.value(), chain.as_ptr());
        assert_eq!(
            next.size(),
            size_of::<vk::PhysicalDeviceFeatures2>() + size_of::<vk::PhysicalDeviceVulkan13Features>()
        );

        let head = unsafe { &*next.value().cast::<vk::PhysicalDeviceFeatures2>() };
        assert_eq!(head.s_type, chain.head().s_type);
        assert_eq!(head.features.geometry_shader, vk::TRUE);
    }

    #[test]
    fn copy_links_into_its_own_storage() {
        let chain = StructureChain::new(chain![
            Probe::<0>::with(1),
            Probe::<1>::with(2),
            Probe::<2>::with(3),
        ]);
        let next = PNext::new(&chain);

        let first = unsafe { &*next.value().cast::<Probe<0>>() };
        let second = unsafe { &*first.p_next.cast_const().cast::<Probe<1>>() };
        let third = unsafe { &*second.p_next.cast_const().cast::<Probe<2>>() };

        let start = next.value() as usize;
        let end = start + next.size();
        assert!((start..end).contains(&(first.p_next as usize)));
        assert!((start..end).contains(&(second.p_next as usize)));
        assert_eq!((first.value, second.value, third.value), (1, 2, 3));
        assert_eq!(third.s_type, Probe::<2>::STRUCTURE_TYPE);
        assert!(third.p_next.is_null());
    }

    #[test]
    fn adopting_a_pinned_chain_keeps_its_address() {
        let chain = StructureChain::new(chain![
            vk::SemaphoreTypeCreateInfo {
                semaphore_type: vk::SemaphoreType::TIMELINE,
                initial_value: 7,
                ..Default::default()
            },
        ]);
        let address = chain.as_ptr();

        let next = PNext::from(chain);

        assert_eq!(next.value(), address);
        let head = unsafe { &*next.value().cast::<vk::SemaphoreTypeCreateInfo>() };
        assert_eq!(head.s_type, StructureType::SEMAPHORE_TYPE_CREATE_INFO);
        assert_eq!(head.initial_value, 7);
    }

    #[test]
    fn erased_features_query_reads_back_through_the_links() {
        let chain = StructureChain::new(chain![
            vk::PhysicalDeviceFeatures2::default(),
            vk::PhysicalDeviceVulkan12Features {
                timeline_semaphore: vk::TRUE,
                ..Default::default()
            },
        ]);
        let next = PNext::new(&chain);
        drop(chain);

        let head = unsafe { &*next.value().cast::<vk::PhysicalDeviceFeatures2>() };
        assert!(!head.p_next.is_null());
        let vulkan12 = unsafe { &*head.p_next.cast_const().cast::<vk::PhysicalDeviceVulkan12Features>() };
        assert_eq!(vulkan12.s_type, StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES);
        assert_eq!(vulkan12.timeline_semaphore, vk::TRUE);
    }

    thread_local! {
        static DROPS: Cell<usize> = Cell::new(0);
    }

    #[repr(C)]
    #[derive(Clone)]
    struct Counted {
        s_type: StructureType,
        p_next: *mut c_void,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            DROPS.with(|drops| drops.set(drops.get() + 1));
        }
    }

    unsafe impl Linkable for Counted {
        const STRUCTURE_TYPE: StructureType = StructureType::from_raw(1_000_991_000);

        fn structure_type(&self) -> StructureType {
            self.s_type
        }

        fn tag(&mut self) {
            self.s_type = Self::STRUCTURE_TYPE;
        }

        fn next(&self) -> *const c_void {
            self.p_next
        }

        fn set_next(&mut self, next: *mut c_void) {
            self.p_next = next;
        }

        fn payload_eq(&self, other: &Self) -> bool {
            self.s_type == other.s_type
        }
    }

    #[test]
    fn dropping_the_handle_drops_every_element_once() {
        let counted = || Counted {
            s_type: StructureType::from_raw(0),
            p_next: ptr::null_mut(),
        };
        DROPS.with(|drops| drops.set(0));

        let chain = StructureChain::new(chain![counted(), counted()]);
        let copied = PNext::new(&chain);
        let adopted = PNext::from(chain);
        assert_eq!(DROPS.with(Cell::get), 0);

        drop(copied);
        assert_eq!(DROPS.with(Cell::get), 2);
        drop(adopted);
        assert_eq!(DROPS.with(Cell::get), 4);
    }

    #[test]
    fn contains_checks_every_owned_structure() {
        let next = PNext::new(&StructureChain::new(chain![
            vk::PhysicalDeviceFeatures2::default(),
            vk::PhysicalDeviceVulkan12Features::default(),
            vk::PhysicalDeviceVulkan13Features::default(),
        ]));

        assert!(next.contains(StructureType::PHYSICAL_DEVICE_FEATURES_2));
        assert!(next.contains(StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES));
        assert!(!next.contains(StructureType::PHYSICAL_DEVICE_VULKAN_1_1_FEATURES));
        assert!(!PNext::default().contains(StructureType::PHYSICAL_DEVICE_FEATURES_2));
    }

    #[repr(C)]
    struct FailingClone {
        s_type: StructureType,
        p_next: *mut c_void,
    }

    impl Clone for FailingClone {
        fn clone(&self) -> Self {
            panic!("clone failed");
        }
    }

    unsafe impl Linkable for FailingClone {
        const STRUCTURE_TYPE: StructureType = StructureType::from_raw(1_000_992_000);

        fn structure_type(&self) -> StructureType {
            self.s_type
        }

        fn tag(&mut self) {
            self.s_type = Self::STRUCTURE_TYPE;
        }

        fn next(&self) -> *const c_void {
            self.p_next
        }

        fn set_next(&mut self, next: *mut c_void) {
            self.p_next = next;
        }

        fn payload_eq(&self, other: &Self) -> bool {
            self.s_type == other.s_type
        }
    }

    #[test]
    fn failed_copy_leaves_the_source_usable() {
        let chain = StructureChain::new(chain![FailingClone {
            s_type: StructureType::from_raw(0),
            p_next: ptr::null_mut(),
        }]);

        let copy = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| PNext::new(&chain)));

        assert!(copy.is_err());
        assert_eq!(chain.head().s_type, FailingClone::STRUCTURE_TYPE);
        let adopted = PNext::from(chain);
        assert!(adopted.contains(FailingClone::STRUCTURE_TYPE));
    }

    #[test]
    fn contains_stops_at_the_caller_tail() {
        let mut last = Probe::<1>::with(2);
        // never dereferenced
        last.p_next = 0x10 as *mut c_void;
        let chain = StructureChain::new(chain![Probe::<0>::with(1), last]);
        let copied = PNext::new(&chain);
        let adopted = PNext::from(chain);

        for next in [&copied, &adopted] {
            assert!(next.contains(Probe::<0>::STRUCTURE_TYPE));
            assert!(next.contains(Probe::<1>::STRUCTURE_TYPE));
            assert!(!next.contains(StructureType::PHYSICAL_DEVICE_FEATURES_2));
        }
    }

    #[test]
    fn moving_the_handle_keeps_the_allocation() {
        let next = PNext::new(&StructureChain::new(chain![Probe::<0>::with(5)]));
        let address = next.value();

        let moved = next;

        assert_eq!(moved.value(), address);
        assert_eq!(unsafe { &*moved.value().cast::<Probe<0>>() }.value, 5);
    }
}
