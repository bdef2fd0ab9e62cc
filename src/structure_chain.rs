//! Statically typed `p_next` chains.
//!
//! A chain is a cons list of [`Linkable`] structures stored in one `#[repr(C)]`
//! value. Building a [`StructureChain`] tags every element with its structure
//! type and points each element's `p_next` at the one after it. The chain is
//! pinned on the heap before it is linked, so the internal pointers stay valid
//! for as long as the chain lives.
//!
//! ```
//! use ash::vk;
//! use vulkan_raii::{chain, StructureChain};
//!
//! let features = StructureChain::new(chain![
//!     vk::PhysicalDeviceFeatures2::default(),
//!     vk::PhysicalDeviceVulkan13Features {
//!         dynamic_rendering: vk::TRUE,
//!         ..Default::default()
//!     },
//! ]);
//!
//! let vulkan13 = features.get::<vk::PhysicalDeviceVulkan13Features, _>();
//! assert_eq!(vulkan13.dynamic_rendering, vk::TRUE);
//! assert_eq!(
//!     features.head().p_next as *const vk::PhysicalDeviceVulkan13Features,
//!     features.at::<1>() as *const _,
//! );
//! ```

use std::{
    ffi::c_void,
    fmt,
    marker::{PhantomData, PhantomPinned},
    mem,
    ops::{Deref, DerefMut},
    pin::Pin,
    ptr,
};

use ash::vk::StructureType;

use crate::structure_type::Linkable;

/// Non-empty link of a chain: one element followed by the rest.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct Cons<H, T> {
    head: H,
    tail: T,
}

impl<H, T> Cons<H, T> {
    pub const fn new(head: H, tail: T) -> Self {
        Self { head, tail }
    }
}

/// End of a chain.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Nil;

/// Builds a chain value from a list of structures.
#[macro_export]
macro_rules! chain {
    ($head:expr $(,)?) => {
        $crate::Cons::new($head, $crate::Nil)
    };
    ($head:expr, $($tail:expr),+ $(,)?) => {
        $crate::Cons::new($head, $crate::chain!($($tail),+))
    };
}

/// Names the type of a chain, e.g. `ChainOf![vk::PhysicalDeviceFeatures2, vk::PhysicalDeviceVulkan12Features]`.
#[allow(non_snake_case)]
#[macro_export]
macro_rules! ChainOf {
    ($head:ty $(,)?) => {
        $crate::Cons<$head, $crate::Nil>
    };
    ($head:ty, $($tail:ty),+ $(,)?) => {
        $crate::Cons<$head, $crate::ChainOf!($($tail),+)>
    };
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Nil {}
    impl<H, T> Sealed for super::Cons<H, T> {}
}

/// A list of [`Linkable`] structures that can be tagged and linked in place.
pub trait ChainList: sealed::Sealed {
    /// Number of elements.
    const LEN: usize;
    /// Sum of the element sizes, with no room for padding between them.
    const ELEMENTS_SIZE: usize;

    /// Address of the first element, or null for the empty tail.
    fn first_link(&mut self) -> *mut c_void;

    /// Sets every tag, and every `p_next` except the last element's.
    fn link(&mut self);

    /// True when one of the element types is tagged `structure_type`.
    fn contains_type(structure_type: StructureType) -> bool;

    /// Element-wise comparison that ignores the links the chain set itself.
    fn elements_eq(&self, other: &Self) -> bool;
}

impl ChainList for Nil {
    const LEN: usize = 0;
    const ELEMENTS_SIZE: usize = 0;

    #[inline]
    fn first_link(&mut self) -> *mut c_void {
        ptr::null_mut()
    }

    #[inline]
    fn link(&mut self) {}

    #[inline]
    fn contains_type(_structure_type: StructureType) -> bool {
        false
    }

    #[inline]
    fn elements_eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<H: Linkable, T: ChainList> ChainList for Cons<H, T> {
    const LEN: usize = 1 + T::LEN;
    const ELEMENTS_SIZE: usize = mem::size_of::<H>() + T::ELEMENTS_SIZE;

    #[inline]
    fn first_link(&mut self) -> *mut c_void {
        (&mut self.head as *mut H).cast()
    }

    fn link(&mut self) {
        self.head.tag();
        // the last element keeps whatever p_next the caller gave it
        if T::LEN > 0 {
            let next = self.tail.first_link();
            self.head.set_next(next);
        }
        self.tail.link();
    }

    fn contains_type(structure_type: StructureType) -> bool {
        H::STRUCTURE_TYPE == structure_type || T::contains_type(structure_type)
    }

    fn elements_eq(&self, other: &Self) -> bool {
        // the last element's p_next is the caller's, so it takes part
        let links_eq = T::LEN > 0 || self.head.next() == other.head.next();
        links_eq && self.head.payload_eq(&other.head) && self.tail.elements_eq(&other.tail)
    }
}

/// Positional access to the `I`th element of a chain.
///
/// Implemented for indices 0 to 15, so positional access reaches the first 16
/// elements. Longer chains still link, and later elements stay reachable by type.
///
/// Indexing past the end does not compile:
///
/// ```compile_fail
/// use ash::vk;
/// use vulkan_raii::{chain, StructureChain};
///
/// let chain = StructureChain::new(chain![vk::PhysicalDeviceFeatures2::default()]);
/// let _ = chain.at::<1>();
/// ```
pub trait At<const I: usize> {
    type Output;

    fn at(&self) -> &Self::Output;

    fn at_mut(&mut self) -> &mut Self::Output;
}

impl<H, T> At<0> for Cons<H, T> {
    type Output = H;

    #[inline]
    fn at(&self) -> &H {
        &self.head
    }

    #[inline]
    fn at_mut(&mut self) -> &mut H {
        &mut self.head
    }
}

macro_rules! impl_at {
    ($($index:literal => $previous:literal),+ $(,)?) => {
        $(
            impl<H, T: At<$previous>> At<$index> for Cons<H, T> {
                type Output = <T as At<$previous>>::Output;

                #[inline]
                fn at(&self) -> &Self::Output {
                    <T as At<$previous>>::at(&self.tail)
                }

                #[inline]
                fn at_mut(&mut self) -> &mut Self::Output {
                    <T as At<$previous>>::at_mut(&mut self.tail)
                }
            }
        )+
    };
}

impl_at! {
    1 => 0, 2 => 1, 3 => 2, 4 => 3, 5 => 4, 6 => 5, 7 => 6, 8 => 7,
    9 => 8, 10 => 9, 11 => 10, 12 => 11, 13 => 12, 14 => 13, 15 => 14,
}

/// Index marker: the element is the head of this link.
pub struct Here;

/// Index marker: the element is somewhere in the tail.
pub struct There<I>(PhantomData<I>);

/// By-type access to the single element of type `S`.
///
/// The index `I` is inferred. A type that is missing from the chain has no
/// matching impl, and a type that appears twice has two, so both are rejected
/// at compile time:
///
/// ```compile_fail
/// use ash::vk;
/// use vulkan_raii::{chain, StructureChain};
///
/// let chain = StructureChain::new(chain![vk::PhysicalDeviceFeatures2::default()]);
/// let _ = chain.get::<vk::PhysicalDeviceVulkan12Features, _>();
/// ```
///
/// ```compile_fail
/// use ash::vk;
/// use vulkan_raii::{chain, StructureChain};
///
/// let chain = StructureChain::new(chain![
///     vk::PhysicalDeviceFeatures2::default(),
///     vk::PhysicalDeviceVulkan12Features::default(),
///     vk::PhysicalDeviceVulkan12Features::default(),
/// ]);
/// let _ = chain.get::<vk::PhysicalDeviceVulkan12Features, _>();
/// ```
pub trait Selector<S, I> {
    fn select(&self) -> &S;

    fn select_mut(&mut self) -> &mut S;
}

impl<S, T> Selector<S, Here> for Cons<S, T> {
    #[inline]
    fn select(&self) -> &S {
        &self.head
    }

    #[inline]
    fn select_mut(&mut self) -> &mut S {
        &mut self.head
    }
}

impl<S, H, T: Selector<S, I>, I> Selector<S, There<I>> for Cons<H, T> {
    #[inline]
    fn select(&self) -> &S {
        self.tail.select()
    }

    #[inline]
    fn select_mut(&mut self) -> &mut S {
        self.tail.select_mut()
    }
}

/// A linked, tagged chain of Vulkan structures.
///
/// Chains are only handed out pinned: the `p_next` pointers point into the
/// chain itself, so it must never move once linked. To hand a chain to a
/// builder that outlives the current scope, convert it into a
/// [`PNext`](crate::PNext).
#[repr(C)]
pub struct StructureChain<L> {
    elements: L,
    _pinned: PhantomPinned,
}

impl<H: Linkable, T: ChainList> StructureChain<Cons<H, T>> {
    const LAYOUT_CHECK: () = assert!(
        mem::size_of::<Cons<H, T>>() == <Cons<H, T> as ChainList>::ELEMENTS_SIZE,
        "structure chain elements are not laid out back to back"
    );

    /// Moves `elements` into a pinned allocation, then tags and links them there.
    pub fn new(elements: Cons<H, T>) -> Pin<Box<Self>> {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT_CHECK;

        let mut chain = Box::pin(Self {
            elements,
            _pinned: PhantomPinned,
        });
        // SAFETY: the elements are linked where they live and never moved out
        unsafe { chain.as_mut().get_unchecked_mut().elements.link() };
        chain
    }

    /// The first element, normally the structure handed to the Vulkan call.
    #[inline]
    pub fn head(&self) -> &H {
        &self.elements.head
    }

    pub fn head_mut(self: Pin<&mut Self>) -> ElementMut<'_, Cons<H, T>, H> {
        // SAFETY: the guard only hands out the element, never the chain itself
        let elements = unsafe { &mut self.get_unchecked_mut().elements };
        ElementMut::new(
            elements,
            <Cons<H, T> as At<0>>::at,
            <Cons<H, T> as At<0>>::at_mut,
        )
    }
}

impl<L: ChainList> StructureChain<L> {
    /// Number of structures in the chain.
    #[inline]
    pub const fn len(&self) -> usize {
        L::LEN
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        L::LEN == 0
    }

    /// Element at position `I`.
    #[inline]
    pub fn at<const I: usize>(&self) -> &<L as At<I>>::Output
    where
        L: At<I>,
    {
        <L as At<I>>::at(&self.elements)
    }

    pub fn at_mut<const I: usize>(self: Pin<&mut Self>) -> ElementMut<'_, L, <L as At<I>>::Output>
    where
        L: At<I>,
    {
        // SAFETY: see head_mut
        let elements = unsafe { &mut self.get_unchecked_mut().elements };
        ElementMut::new(elements, <L as At<I>>::at, <L as At<I>>::at_mut)
    }

    /// The only element of type `S`.
    #[inline]
    pub fn get<S, I>(&self) -> &S
    where
        L: Selector<S, I>,
    {
        <L as Selector<S, I>>::select(&self.elements)
    }

    /// Mutable access to the only element of type `S`.
    pub fn select_mut<S, I>(self: Pin<&mut Self>) -> ElementMut<'_, L, S>
    where
        L: Selector<S, I>,
    {
        // SAFETY: see head_mut
        let elements = unsafe { &mut self.get_unchecked_mut().elements };
        ElementMut::new(elements, <L as Selector<S, I>>::select, <L as Selector<S, I>>::select_mut)
    }

    /// Address of the head, suitable for a `p_next` field.
    #[inline]
    pub fn as_ptr(&self) -> *const c_void {
        (&self.elements as *const L).cast()
    }

    pub(crate) fn elements(&self) -> &L {
        &self.elements
    }

    /// Writes `elements` to `place` and links them at that address.
    ///
    /// # Safety
    ///
    /// `place` must be valid for writes of `Self`, suitably aligned, and must
    /// not move for as long as the written chain is in use.
    pub(crate) unsafe fn write_linked(place: *mut Self, elements: L) {
        place.write(Self {
            elements,
            _pinned: PhantomPinned,
        });
        (*place).elements.link();
    }
}

impl<L: ChainList + fmt::Debug> fmt::Debug for StructureChain<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructureChain")
            .field("elements", &self.elements)
            .finish()
    }
}

impl<L: ChainList> PartialEq for StructureChain<L> {
    fn eq(&self, other: &Self) -> bool {
        self.elements.elements_eq(&other.elements)
    }
}

/// Mutable borrow of one chain element.
///
/// Tags and links are re-applied when the borrow ends, so assigning a whole
/// new value to the element cannot break the chain.
pub struct ElementMut<'a, L: ChainList, S> {
    elements: &'a mut L,
    select: fn(&L) -> &S,
    select_mut: fn(&mut L) -> &mut S,
}

impl<'a, L: ChainList, S> ElementMut<'a, L, S> {
    fn new(elements: &'a mut L, select: fn(&L) -> &S, select_mut: fn(&mut L) -> &mut S) -> Self {
        Self {
            elements,
            select,
            select_mut,
        }
    }
}

impl<L: ChainList, S> Deref for ElementMut<'_, L, S> {
    type Target = S;

    fn deref(&self) -> &S {
        (self.select)(self.elements)
    }
}

impl<L: ChainList, S> DerefMut for ElementMut<'_, L, S> {
    fn deref_mut(&mut self) -> &mut S {
        (self.select_mut)(self.elements)
    }
}

impl<L: ChainList, S> Drop for ElementMut<'_, L, S> {
    fn drop(&mut self) {
        self.elements.link();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::mem::size_of;

    use ash::vk::{self, StructureType};

    use super::*;

    /// Minimal linkable record for exercising chains of arbitrary shape.
    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub(crate) struct Probe<const N: u64> {
        pub s_type: StructureType,
        pub p_next: *mut c_void,
        pub value: u64,
    }

    impl<const N: u64> Probe<N> {
        pub(crate) fn with(value: u64) -> Self {
            Self {
                s_type: StructureType::from_raw(0),
                p_next: ptr::null_mut(),
                value,
            }
        }
    }

    unsafe impl<const N: u64> Linkable for Probe<N> {
        const STRUCTURE_TYPE: StructureType = StructureType::from_raw(1_000_990_000 + N as i32);

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
            self.s_type == other.s_type && self.value == other.value
        }
    }

    fn addr<T>(value: &T) -> *const c_void {
        (value as *const T).cast()
    }

    #[test]
    fn chain_size_is_the_sum_of_its_elements() {
        assert_eq!(
            size_of::<StructureChain<ChainOf![vk::PhysicalDeviceFeatures2]>>(),
            size_of::<vk::PhysicalDeviceFeatures2>()
        );
        assert_eq!(
            size_of::<ChainOf![vk::DeviceCreateInfo, vk::PhysicalDeviceFeatures2]>(),
            size_of::<vk::DeviceCreateInfo>() + size_of::<vk::PhysicalDeviceFeatures2>()
        );
        assert_eq!(
            size_of::<
                ChainOf![
                    vk::PhysicalDeviceFeatures2,
                    vk::PhysicalDeviceVulkan11Features,
                    vk::PhysicalDeviceVulkan12Features,
                    vk::PhysicalDeviceVulkan13Features,
                ],
            >(),
            size_of::<vk::PhysicalDeviceFeatures2>()
                + size_of::<vk::PhysicalDeviceVulkan11Features>()
                + size_of::<vk::PhysicalDeviceVulkan12Features>()
                + size_of::<vk::PhysicalDeviceVulkan13Features>()
        );
        assert_eq!(
            <ChainOf![Probe<0>, Probe<1>, Probe<2>, Probe<3>] as ChainList>::ELEMENTS_SIZE,
            4 * size_of::<Probe<0>>()
        );
    }

    #[test]
    fn single_element_chain_is_tagged_and_keeps_its_next() {
        let mut external = vk::PhysicalDeviceVulkan12Features::default();
        let external_ptr = (&mut external as *mut vk::PhysicalDeviceVulkan12Features).cast();

        let chain = StructureChain::new(chain![vk::DeviceCreateInfo {
            s_type: StructureType::APPLICATION_INFO,
            p_next: external_ptr,
            ..Default::default()
        }]);

        assert_eq!(chain.len(), 1);
        assert_eq!(chain.head().s_type, StructureType::DEVICE_CREATE_INFO);
        assert_eq!(chain.head().p_next, external_ptr as *const c_void);
    }

    #[test]
    fn every_element_links_to_its_successor() {
        let chain = StructureChain::new(chain![
            Probe::<0>::with(10),
            Probe::<1>::with(11),
            Probe::<2>::with(12),
            Probe::<3>::with(13),
        ]);

        assert_eq!(chain.len(), 4);
        assert_eq!(chain.at::<0>().p_next as *const c_void, addr(chain.at::<1>()));
        assert_eq!(chain.at::<1>().p_next as *const c_void, addr(chain.at::<2>()));
        assert_eq!(chain.at::<2>().p_next as *const c_void, addr(chain.at::<3>()));
        assert!(chain.at::<3>().p_next.is_null());

        assert_eq!(chain.at::<0>().s_type, Probe::<0>::STRUCTURE_TYPE);
        assert_eq!(chain.at::<3>().s_type, Probe::<3>::STRUCTURE_TYPE);
        assert_eq!(chain.as_ptr(), addr(chain.head()));
    }

    #[test]
    fn tail_next_is_left_for_the_caller() {
        let mut external = Probe::<9>::with(0);
        let external_ptr = (&mut external as *mut Probe<9>).cast::<c_void>();

        let mut last = Probe::<1>::with(1);
        last.p_next = external_ptr;
        let chain = StructureChain::new(chain![Probe::<0>::with(0), last]);

        assert_eq!(chain.at::<1>().p_next, external_ptr);
    }

    #[test]
    fn tags_and_links_do_not_depend_on_payload() {
        let a = StructureChain::new(chain![
            vk::PhysicalDeviceFeatures2::default(),
            vk::PhysicalDeviceVulkan12Features {
                timeline_semaphore: vk::TRUE,
                ..Default::default()
            },
        ]);
        let b = StructureChain::new(chain![
            vk::PhysicalDeviceFeatures2 {
                features: vk::PhysicalDeviceFeatures {
                    sampler_anisotropy: vk::TRUE,
                    ..Default::default()
                },
                ..Default::default()
            },
            vk::PhysicalDeviceVulkan12Features::default(),
        ]);

        assert_eq!(a.head().s_type, b.head().s_type);
        assert_eq!(a.at::<1>().s_type, b.at::<1>().s_type);
        // both link to their own second element, at the same offset
        assert_eq!(
            a.head().p_next as usize - a.as_ptr() as usize,
            b.head().p_next as usize - b.as_ptr() as usize
        );
        assert_eq!(a.at::<1>().p_next, b.at::<1>().p_next);

        assert_eq!(a.at::<1>().timeline_semaphore, vk::TRUE);
        assert_eq!(b.at::<1>().timeline_semaphore, vk::FALSE);
        assert_eq!(a.head().features.sampler_anisotropy, vk::FALSE);
        assert_eq!(b.head().features.sampler_anisotropy, vk::TRUE);
    }

    #[test]
    fn by_type_and_by_position_alias_the_same_storage() {
        let chain = StructureChain::new(chain![
            vk::PhysicalDeviceFeatures2::default(),
            vk::PhysicalDeviceVulkan11Features::default(),
            vk::PhysicalDeviceVulkan12Features::default(),
            vk::PhysicalDeviceVulkan13Features::default(),
        ]);

        assert_eq!(
            addr(chain.get::<vk::PhysicalDeviceFeatures2, _>()),
            addr(chain.at::<0>())
        );
        assert_eq!(
            addr(chain.get::<vk::PhysicalDeviceVulkan11Features, _>()),
            addr(chain.at::<1>())
        );
        assert_eq!(
            addr(chain.get::<vk::PhysicalDeviceVulkan12Features, _>()),
            addr(chain.at::<2>())
        );
        assert_eq!(
            addr(chain.get::<vk::PhysicalDeviceVulkan13Features, _>()),
            addr(chain.at::<3>())
        );
    }

    #[test]
    fn features_query_scenario() {
        let chain = StructureChain::new(chain![
            vk::PhysicalDeviceFeatures2::default(),
            vk::PhysicalDeviceVulkan12Features {
                timeline_semaphore: vk::TRUE,
                ..Default::default()
            },
        ]);

        assert_eq!(chain.head().p_next as *const c_void, addr(chain.at::<1>()));
        assert_eq!(
            chain
                .get::<vk::PhysicalDeviceVulkan12Features, _>()
                .timeline_semaphore,
            vk::TRUE
        );
    }

    #[test]
    fn mutable_access_changes_payload_only() {
        let mut chain = StructureChain::new(chain![
            vk::PhysicalDeviceFeatures2::default(),
            vk::PhysicalDeviceVulkan13Features::default(),
        ]);

        chain
            .as_mut()
            .select_mut::<vk::PhysicalDeviceVulkan13Features, _>()
            .synchronization2 = vk::TRUE;
        chain.as_mut().head_mut().features.fill_mode_non_solid = vk::TRUE;
        chain.as_mut().at_mut::<1>().dynamic_rendering = vk::TRUE;

        assert_eq!(chain.at::<1>().synchronization2, vk::TRUE);
        assert_eq!(chain.at::<1>().dynamic_rendering, vk::TRUE);
        assert_eq!(chain.head().features.fill_mode_non_solid, vk::TRUE);
        assert_eq!(chain.head().p_next as *const c_void, addr(chain.at::<1>()));
    }

    #[test]
    fn overwriting_an_element_is_relinked() {
        let mut chain = StructureChain::new(chain![
            Probe::<0>::with(1),
            Probe::<1>::with(2),
            Probe::<2>::with(3),
        ]);

        *chain.as_mut().at_mut::<1>() = Probe::<1>::with(20);
        *chain.as_mut().head_mut() = Probe::<0>::with(10);

        assert_eq!(chain.at::<0>().value, 10);
        assert_eq!(chain.at::<1>().value, 20);
        assert_eq!(chain.at::<0>().s_type, Probe::<0>::STRUCTURE_TYPE);
        assert_eq!(chain.at::<1>().s_type, Probe::<1>::STRUCTURE_TYPE);
        assert_eq!(chain.at::<0>().p_next as *const c_void, addr(chain.at::<1>()));
        assert_eq!(chain.at::<1>().p_next as *const c_void, addr(chain.at::<2>()));
    }

    #[test]
    fn equality_ignores_internal_links() {
        let a = StructureChain::new(chain![Probe::<0>::with(1), Probe::<1>::with(2)]);
        let b = StructureChain::new(chain![Probe::<0>::with(1), Probe::<1>::with(2)]);
        let c = StructureChain::new(chain![Probe::<0>::with(1), Probe::<1>::with(3)]);

        assert_ne!(a.head().p_next, b.head().p_next);
        assert!(*a == *b);
        assert!(*a != *c);
    }

    #[test]
    fn equality_compares_vulkan_feature_chains() {
        let requested = || {
            StructureChain::new(chain![
                vk::PhysicalDeviceFeatures2 {
                    features: vk::PhysicalDeviceFeatures {
                        sampler_anisotropy: vk::TRUE,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                vk::PhysicalDeviceVulkan12Features {
                    timeline_semaphore: vk::TRUE,
                    ..Default::default()
                },
            ])
        };
        let a = requested();
        let b = requested();
        let mut c = requested();
        c.as_mut()
            .select_mut::<vk::PhysicalDeviceVulkan12Features, _>()
            .buffer_device_address = vk::TRUE;

        assert_ne!(a.head().p_next, b.head().p_next);
        assert!(*a == *b);
        assert!(*a != *c);
    }

    #[test]
    fn equality_includes_the_caller_tail() {
        let mut external = Probe::<9>::with(0);
        let external_ptr = (&mut external as *mut Probe<9>).cast::<c_void>();
        let mut last = Probe::<1>::with(2);
        last.p_next = external_ptr;

        let open = StructureChain::new(chain![Probe::<0>::with(1), last]);
        let closed = StructureChain::new(chain![Probe::<0>::with(1), Probe::<1>::with(2)]);

        assert!(*open != *closed);
    }

    #[test]
    fn contained_types_come_from_the_elements() {
        type Features = ChainOf![vk::PhysicalDeviceFeatures2, vk::PhysicalDeviceVulkan13Features];

        assert!(Features::contains_type(StructureType::PHYSICAL_DEVICE_FEATURES_2));
        assert!(Features::contains_type(StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES));
        assert!(!Features::contains_type(StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES));
        assert!(!Nil::contains_type(StructureType::PHYSICAL_DEVICE_FEATURES_2));
    }

    #[test]
    fn repeated_types_remain_reachable_by_position() {
        let chain = StructureChain::new(chain![
            Probe::<0>::with(1),
            Probe::<0>::with(2),
        ]);

        assert_eq!(chain.at::<0>().value, 1);
        assert_eq!(chain.at::<1>().value, 2);
        assert_eq!(chain.at::<0>().p_next as *const c_void, addr(chain.at::<1>()));
    }
}
