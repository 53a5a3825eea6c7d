use crate::Allocator;

// The transfer protocol compares instance identities by address, and zero-sized statics are not
// guaranteed distinct addresses, so the singleton must occupy at least one byte.
static NULL_ALLOCATOR: NullAllocator = NullAllocator { _identity: 0 };

/// The allocator that never allocates.
///
/// Every operation is a fatal failure. This exists for two reasons: it is the terminal path for
/// heap exhaustion in [`GlobalAllocator`](crate::GlobalAllocator), and it is a safe binding for
/// buffers that must never be materialized, e.g. a placeholder meaning no allocation has happened
/// yet. A container bound to it works fine until the moment it would actually touch memory.
pub struct NullAllocator {
    _identity: u8,
}

impl NullAllocator {
    pub fn instance() -> &'static NullAllocator {
        &NULL_ALLOCATOR
    }
}

impl Allocator for NullAllocator {
    fn allocate(&self, size: usize, align: usize) -> *mut u8 {
        panic!("NullAllocator can't allocate {size} bytes (align {align}): out of memory, or allocating on a path that must never allocate");
    }

    fn deallocate(&self, ptr: *mut u8, align: usize) {
        let _ = align;
        panic!("NullAllocator can't deallocate {ptr:p}: it never allocated anything");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn test_allocate_is_fatal() {
        NullAllocator::instance().allocate(16, 8);
    }

    #[test]
    #[should_panic]
    fn test_deallocate_is_fatal() {
        let ptr = 16usize as *mut u8;
        NullAllocator::instance().deallocate(ptr, 8);
    }

    #[test]
    #[should_panic]
    fn test_accept_transfer_default_is_fatal() {
        let null = NullAllocator::instance();
        null.accept_transfer_from(null);
    }
}
