use core::ptr;

use crate::null::NullAllocator;
use crate::Allocator;

// malloc aligns to max_align_t, which is 16 on the 64-bit platforms we run on. Anything above
// that we have to produce ourselves.
const BASELINE_ALIGN: usize = 16;

// The transfer protocol compares instance identities by address, and zero-sized statics are not
// guaranteed distinct addresses, so the singleton must occupy at least one byte.
static GLOBAL_ALLOCATOR: GlobalAllocator = GlobalAllocator { _identity: 0 };

/// The process-heap allocator.
///
/// A stateless process-wide singleton delegating to `malloc`/`free`. Alignments at or below the
/// malloc baseline are satisfied directly. Larger alignments over-allocate by `align` bytes,
/// offset the returned address up to the next `align` boundary, and stash the heap block's base
/// address just below the returned address; [`Self::deallocate`] reverses the offset through the
/// stashed base. Because the two branches differ, deallocation must always be given the same
/// alignment the block was allocated with.
///
/// Heap exhaustion is fatal: a failed request is routed to [`NullAllocator`], which aborts,
/// instead of surfacing a null address.
///
/// The singleton accepts buffer ownership transfers only from itself. Two containers bound to it
/// share the same heap, so handing a buffer between them needs no bookkeeping at all.
pub struct GlobalAllocator {
    _identity: u8,
}

impl GlobalAllocator {
    pub fn instance() -> &'static GlobalAllocator {
        &GLOBAL_ALLOCATOR
    }
}

impl Allocator for GlobalAllocator {
    fn allocate(&self, size: usize, align: usize) -> *mut u8 {
        debug_assert!(align.is_power_of_two());

        let ptr: *mut u8 = if align <= BASELINE_ALIGN {
            unsafe { libc::malloc(size).cast() }
        } else {
            let raw: *mut u8 = unsafe { libc::malloc(size + align).cast() };
            if raw.is_null() {
                raw
            } else {
                // Leave room for the stashed base address, then align up. The offset is at least
                // a usize and at most align, so [data, data + size) stays inside the block.
                let raw_addr = raw as usize;
                let data_addr = align_to(raw_addr + size_of::<usize>(), align);
                debug_assert!(data_addr - raw_addr <= align);

                let data: *mut u8 = unsafe { raw.add(data_addr - raw_addr) };

                // SAFETY: data is align-aligned with align > 16, so data - 8 is in the block and
                // aligned for usize.
                unsafe {
                    data.sub(size_of::<usize>()).cast::<usize>().write(raw_addr);
                }

                data
            }
        };

        if ptr.is_null() {
            // No in-band failure channel exists. The null allocator terminates the process.
            return NullAllocator::instance().allocate(size, align);
        }

        ptr
    }

    fn deallocate(&self, ptr: *mut u8, align: usize) {
        debug_assert!(align.is_power_of_two());

        if ptr.is_null() {
            return;
        }

        if align <= BASELINE_ALIGN {
            unsafe { libc::free(ptr.cast()) }
        } else {
            // SAFETY: Blocks with over-baseline alignment carry their heap base address just
            // below the returned address, see Self::allocate.
            unsafe {
                let raw_addr = ptr.sub(size_of::<usize>()).cast::<usize>().read();
                libc::free(raw_addr as *mut _);
            }
        }
    }

    fn can_accept_transfer_from(&self, other: &dyn Allocator) -> bool {
        ptr::addr_eq(other, &GLOBAL_ALLOCATOR)
    }

    fn accept_transfer_from(&self, other: &dyn Allocator) {
        assert!(
            self.can_accept_transfer_from(other),
            "Buffer ownership transfer accepted from an incompatible allocator"
        );

        // Both sides are the same heap. There is no bookkeeping to hand over.
    }
}

fn align_to(addr: usize, align: usize) -> usize {
    debug_assert!(align > 0);
    debug_assert!(align.is_power_of_two());

    let mask = align - 1;
    (addr + mask) & !mask
}
