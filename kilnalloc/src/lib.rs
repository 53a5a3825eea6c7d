#![no_std]

//! This library contains the allocator capability used by the kiln containers: a small
//! polymorphic contract for raw memory, plus the two concrete allocators the engine core needs,
//! [`GlobalAllocator`] (the process heap) and [`NullAllocator`] (a fatal placeholder).
//!
//! Containers never touch raw memory directly. They are bound to one allocator instance at
//! construction and route every acquisition and release through it.

mod global;
mod null;

pub use crate::global::GlobalAllocator;
pub use crate::null::NullAllocator;

/// The raw memory capability.
///
/// Implementations hand out byte addresses and take them back. In addition to that, they can
/// optionally take part in the buffer ownership-transfer protocol, which lets a buffer allocated
/// by one instance be adopted by another without copying. The defaults opt out of the protocol.
///
/// Allocation failure is not reported in-band anywhere in this contract. An allocator that cannot
/// satisfy a request fails fatally instead of returning null.
///
/// None of this is synchronized. Sharing an allocator instance between threads without external
/// synchronization is not supported.
pub trait Allocator {
    /// Allocates a block of `size` bytes, aligned to `align`.
    ///
    /// `align` must be a power of two.
    fn allocate(&self, size: usize, align: usize) -> *mut u8;

    /// Releases a block previously returned by [`Self::allocate`].
    ///
    /// `align` must be the same value the block was allocated with. A null `ptr` is a no-op.
    fn deallocate(&self, ptr: *mut u8, align: usize);

    /// Answers whether buffers allocated by `other` may be adopted by `self` without copying.
    ///
    /// Has no side effects. The default says no; allocators have to opt into the transfer
    /// protocol explicitly, because buffers are tied to the memory source they came from.
    fn can_accept_transfer_from(&self, other: &dyn Allocator) -> bool {
        let _ = other;
        false
    }

    /// Finalizes the adoption of `other`'s buffers by `self`.
    ///
    /// Calling this when [`Self::can_accept_transfer_from`] would have returned false is a
    /// programming error and fails fatally rather than silently corrupting state.
    fn accept_transfer_from(&self, other: &dyn Allocator) {
        let _ = other;
        panic!("Buffer ownership transfer is not supported by this allocator");
    }
}
