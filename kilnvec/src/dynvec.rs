use core::borrow::Borrow;
use core::borrow::BorrowMut;
use core::cmp::Ordering;
use core::fmt;
use core::hash::Hash;
use core::hash::Hasher;
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ops::DerefMut;
use core::ops::Index;
use core::ops::IndexMut;
use core::ptr;
use core::slice;

use kilnalloc::Allocator;
use kilnalloc::GlobalAllocator;

#[repr(C)]
struct Header {
    len: u32,
    capacity: u32,
}

// The header stride arithmetic assumes the header size is a power of two.
const _: () = assert!(size_of::<Header>().is_power_of_two());

// Read-only stand-in for containers that haven't allocated yet. Never written to.
static EMPTY_HEADER: Header = Header { len: 0, capacity: 0 };

/// Byte distance between the start of the allocated block (where the header lives) and the start
/// of the element buffer. Always a multiple of T's alignment.
const fn header_stride<T>() -> usize {
    if align_of::<T>() <= size_of::<Header>() {
        size_of::<Header>()
    } else {
        align_of::<T>()
    }
}

/// Alignment requested for the whole block. Covers both the header at the block base and the
/// elements at the stride offset, even under allocators that honor the request exactly.
const fn block_align<T>() -> usize {
    if align_of::<T>() <= align_of::<Header>() {
        align_of::<Header>()
    } else {
        align_of::<T>()
    }
}

fn block_size<T>(capacity: usize) -> usize {
    let size = size_of::<T>()
        .checked_mul(capacity)
        .and_then(|elements_size| elements_size.checked_add(header_stride::<T>()));

    match size {
        Some(size) => size,
        None => panic!("Allocation size overflow for capacity {capacity}"),
    }
}

/// A growable array bound to an allocator instance.
///
/// The vector stores a small header (`len` and `capacity`, a `u32` each) immediately in front of
/// the element buffer, inside the same allocation, so a vector of n elements costs exactly one
/// block of `header_stride + n * size_of::<T>()` bytes. The struct itself is just the buffer
/// pointer and the allocator binding; the pointer is null until the first growth, in which case
/// reads go through a shared static empty header.
///
/// Every acquisition and release of memory goes through the bound allocator, which is fixed for
/// the container's lifetime. Buffers can be handed between two differently-bound containers
/// without copying via [`Self::transfer_from`], but only when the destination allocator agrees to
/// adopt the source's buffer; a denied transfer is fatal, never a silent element-wise copy.
///
/// All misuse (out-of-range access, transfer denial, allocation exhaustion) fails fatally. There
/// is no recoverable error channel, and no synchronization: `DynVec` is a single-threaded
/// container.
pub struct DynVec<'a, T> {
    data: *mut T,
    alloc: &'a dyn Allocator,
    _owns: PhantomData<T>,
}

impl<'a, T> DynVec<'a, T> {
    /// Creates an empty vector bound to the process-heap allocator.
    ///
    /// Does not allocate until the first insertion or capacity request.
    #[inline]
    pub fn new() -> Self {
        Self::new_in(GlobalAllocator::instance())
    }

    /// Creates an empty vector bound to the given allocator instance.
    ///
    /// The binding is fixed for the container's lifetime. Does not allocate.
    #[inline]
    pub const fn new_in(alloc: &'a dyn Allocator) -> Self {
        Self {
            data: ptr::null_mut(),
            alloc,
            _owns: PhantomData,
        }
    }

    /// Creates a vector with exactly `capacity` reserved slots, bound to the process-heap
    /// allocator.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, GlobalAllocator::instance())
    }

    /// Creates a vector with exactly `capacity` reserved slots, bound to the given allocator.
    #[inline]
    pub fn with_capacity_in(capacity: usize, alloc: &'a dyn Allocator) -> Self {
        let mut vec = Self::new_in(alloc);
        vec.reserve(capacity);

        vec
    }

    /// Returns the allocator instance this vector is bound to.
    #[inline]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.alloc
    }

    #[inline]
    fn header(&self) -> &Header {
        if self.data.is_null() {
            return &EMPTY_HEADER;
        }

        // SAFETY: A non-null data pointer always points at the element buffer of a live block,
        // and the header lives exactly one stride before it, aligned for Header because the
        // block was allocated with at least Header's alignment.
        unsafe { &*self.data.cast::<u8>().sub(header_stride::<T>()).cast::<Header>() }
    }

    #[inline]
    fn header_mut(&mut self) -> &mut Header {
        // Mutating paths allocate before they touch the header, so the shared empty header is
        // never written to.
        debug_assert!(!self.data.is_null());

        // SAFETY: Same as Self::header, and we hold a &mut to the only owner of the block.
        unsafe { &mut *self.data.cast::<u8>().sub(header_stride::<T>()).cast::<Header>() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.header().len as usize
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.header().capacity as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the vector to a freshly allocated block sized for exactly `new_capacity` elements.
    ///
    /// The live elements are moved over bitwise and the old block is released as a unit, header
    /// included, without running element drop code.
    fn realloc(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity >= self.len());
        assert!(
            new_capacity <= u32::MAX as usize,
            "DynVec capacity {new_capacity} doesn't fit the u32 header"
        );

        let len = self.len();

        let block = self.alloc.allocate(block_size::<T>(new_capacity), block_align::<T>());
        let new_data: *mut T = unsafe { block.add(header_stride::<T>()).cast() };

        // SAFETY: The block base is aligned for Header and the buffer start is aligned for T,
        // see block_align and header_stride. The allocator never returns null; exhaustion is
        // fatal inside allocate.
        unsafe {
            block.cast::<Header>().write(Header {
                len: len as u32,
                capacity: new_capacity as u32,
            });

            if !self.data.is_null() {
                // Fresh block, so the regions can't overlap.
                ptr::copy_nonoverlapping(self.data, new_data, len);
                self.release_block();
            }
        }

        self.data = new_data;
    }

    /// Releases the header+buffer block back to the bound allocator.
    ///
    /// # Safety
    ///
    /// The elements must have already been dropped or moved out; this only frees the raw block.
    unsafe fn release_block(&mut self) {
        debug_assert!(!self.data.is_null());

        let block = unsafe { self.data.cast::<u8>().sub(header_stride::<T>()) };
        self.alloc.deallocate(block, block_align::<T>());

        self.data = ptr::null_mut();
    }

    fn grow_amortized(&mut self) {
        let capacity = self.capacity();

        // 1.5x growth with a floor of one element.
        let new_capacity = if capacity == 0 {
            1
        } else {
            capacity + usize::max(1, capacity / 2)
        };

        self.realloc(new_capacity);
    }

    /// Ensures capacity for at least `new_capacity` elements, reallocating to exactly
    /// `new_capacity` if the current block is smaller. Capacity never shrinks.
    pub fn reserve(&mut self, new_capacity: usize) {
        if self.capacity() < new_capacity {
            self.realloc(new_capacity);
        }
    }

    /// Appends an element, growing the buffer first if it is full.
    pub fn push(&mut self, value: T) {
        let len = self.len();
        if len == self.capacity() {
            self.grow_amortized();
        }

        // SAFETY: len < capacity after the growth check, so the slot is in bounds of the buffer
        // and holds raw storage.
        unsafe {
            self.data.add(len).write(value);
        }

        self.header_mut().len += 1;
    }

    /// Inserts an element at `index`, shifting everything from `index` on one slot to the right.
    ///
    /// `index` may be `len`, which appends. Fails fatally when `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        let len = self.len();
        assert!(index <= len, "Insert index {index} out of bounds (len {len})");

        if len == self.capacity() {
            self.grow_amortized();
        }

        unsafe {
            let slot = self.data.add(index);

            // Upshift the tail first. ptr::copy handles the overlap, which is equivalent to
            // moving element by element back-to-front.
            if index < len {
                ptr::copy(slot, slot.add(1), len - index);
            }

            slot.write(value);
        }

        self.header_mut().len += 1;
    }

    /// Removes and returns the element at `index`, shifting the tail left to close the gap.
    ///
    /// Fails fatally when `index >= len`.
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len();
        assert!(index < len, "Remove index {index} out of bounds (len {len})");

        // Move the element out first.
        let value = unsafe { self.data.add(index).read() };

        // Downshift only if there is a tail, because pointer::add past the buffer invokes UB
        // immediately when called, not when used.
        if index < len - 1 {
            unsafe {
                ptr::copy(self.data.add(index + 1), self.data.add(index), len - index - 1);
            }
        }

        self.header_mut().len -= 1;

        value
    }

    /// Removes `count` elements starting at `index`, dropping them and shifting the remaining
    /// tail left.
    ///
    /// Fails fatally when `index + count > len`.
    pub fn remove_range(&mut self, index: usize, count: usize) {
        let len = self.len();
        assert!(
            count <= len && index <= len - count,
            "Remove range {index}..{} out of bounds (len {len})",
            index + count
        );

        if count == 0 {
            return;
        }

        unsafe {
            if mem::needs_drop::<T>() {
                for i in index..index + count {
                    ptr::drop_in_place(self.data.add(i));
                }
            }

            ptr::copy(self.data.add(index + count), self.data.add(index), len - index - count);
        }

        self.header_mut().len -= count as u32;
    }

    /// Shortens the vector to `new_len` elements, dropping the tail. No-op when `new_len >= len`.
    ///
    /// The backing buffer is kept; capacity does not change.
    pub fn truncate(&mut self, new_len: usize) {
        let len = self.len();
        if new_len >= len {
            return;
        }

        if mem::needs_drop::<T>() {
            for i in new_len..len {
                // SAFETY: Everything in [new_len, len) is a live element we own.
                unsafe {
                    ptr::drop_in_place(self.data.add(i));
                }
            }
        }

        // len > new_len >= 0 implies a live block.
        self.header_mut().len = new_len as u32;
    }

    /// Drops all elements. The backing buffer is kept; only destruction or a buffer transfer
    /// releases it.
    #[inline]
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Resizes to exactly `new_len` elements, filling new slots with values produced by `f`.
    ///
    /// Growing beyond the current capacity reallocates to exactly `new_len`; shrinking drops the
    /// tail in place and keeps the buffer.
    pub fn resize_with<F: FnMut() -> T>(&mut self, new_len: usize, mut f: F) {
        let len = self.len();

        if new_len > len {
            self.reserve(new_len);

            for i in len..new_len {
                // SAFETY: Reserved above; [len, new_len) is raw storage in bounds of capacity.
                unsafe {
                    self.data.add(i).write(f());
                }
            }

            self.header_mut().len = new_len as u32;
        } else {
            self.truncate(new_len);
        }
    }

    /// Resizes to exactly `new_len` elements, filling new slots with clones of `value`.
    #[inline]
    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        self.resize_with(new_len, || value.clone());
    }

    /// Adopts `other`'s buffer without copying elements, leaving `other` empty.
    ///
    /// This is the move protocol between two containers with their own allocator bindings. The
    /// adoption is only permitted when this vector's allocator reports it can accept buffers
    /// from `other`'s allocator; a denied transfer is fatal by design, because silently
    /// degrading a constant-time move into an element-wise copy is worse than an explicit crash.
    ///
    /// The destination's previous elements and buffer are destroyed. The source keeps its
    /// allocator binding and stays fully usable, just empty.
    pub fn transfer_from(&mut self, other: &mut DynVec<'_, T>) {
        assert!(
            self.alloc.can_accept_transfer_from(other.alloc),
            "Buffer ownership transfer denied between incompatible allocators"
        );

        self.alloc.accept_transfer_from(other.alloc);

        self.destroy();

        // Exactly one container owns the block at any time.
        self.data = other.data;
        other.data = ptr::null_mut();
    }

    /// Swaps the contents of two vectors while keeping each vector's allocator binding.
    ///
    /// Implemented generically as copy + move; this is not a hot path. Both directions of the
    /// underlying transfer must be permitted, otherwise this fails fatally.
    pub fn swap(&mut self, other: &mut Self)
    where
        T: Clone,
    {
        let mut cloned = self.clone();
        self.transfer_from(other);
        other.transfer_from(&mut cloned);
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }

        // SAFETY: index < len, so the slot holds a live element.
        Some(unsafe { &*self.data.add(index) })
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len() {
            return None;
        }

        // SAFETY: index < len, so the slot holds a live element.
        Some(unsafe { &mut *self.data.add(index) })
    }

    /// Returns the first element. Fails fatally on an empty vector.
    #[inline]
    pub fn front(&self) -> &T {
        assert!(!self.is_empty(), "front() on an empty DynVec");
        unsafe { &*self.data }
    }

    /// Returns the last element. Fails fatally on an empty vector.
    #[inline]
    pub fn back(&self) -> &T {
        assert!(!self.is_empty(), "back() on an empty DynVec");
        unsafe { &*self.data.add(self.len() - 1) }
    }

    #[inline]
    pub fn front_mut(&mut self) -> &mut T {
        assert!(!self.is_empty(), "front_mut() on an empty DynVec");
        unsafe { &mut *self.data }
    }

    #[inline]
    pub fn back_mut(&mut self) -> &mut T {
        assert!(!self.is_empty(), "back_mut() on an empty DynVec");
        unsafe { &mut *self.data.add(self.len() - 1) }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        if self.data.is_null() {
            return &[];
        }

        // SAFETY: Everything in [0, len) is initialized, and data is non-null and aligned.
        unsafe { slice::from_raw_parts(self.data, self.len()) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.data.is_null() {
            return &mut [];
        }

        // SAFETY: Everything in [0, len) is initialized, and data is non-null and aligned.
        unsafe { slice::from_raw_parts_mut(self.data, self.len()) }
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Drops all live elements and releases the block. No-op for a vector that never allocated.
    fn destroy(&mut self) {
        if self.data.is_null() {
            return;
        }

        // Trivially-destructible element types skip the drop loop entirely.
        if mem::needs_drop::<T>() {
            for i in 0..self.len() {
                // SAFETY: Everything in [0, len) is a live element we own.
                unsafe {
                    ptr::drop_in_place(self.data.add(i));
                }
            }
        }

        // SAFETY: All elements were dropped just above (or need no drop).
        unsafe {
            self.release_block();
        }
    }
}

impl<T> Drop for DynVec<'_, T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<'a, T: Clone> Clone for DynVec<'a, T> {
    /// Builds a new, independent vector through the same bound allocator, copying each element
    /// in order. Never aliases the source's buffer.
    fn clone(&self) -> Self {
        let mut cloned = DynVec::new_in(self.alloc);
        cloned.reserve(self.len());

        for value in self.as_slice() {
            cloned.push(value.clone());
        }

        cloned
    }
}

impl<T> Default for DynVec<'_, T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Extend<T> for DynVec<'_, T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DynVec<'_, T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for DynVec<'_, T> {
    #[inline]
    fn eq(&self, rhs: &Self) -> bool {
        self.as_slice() == rhs.as_slice()
    }
}

impl<T: PartialEq> PartialEq<[T]> for DynVec<'_, T> {
    #[inline]
    fn eq(&self, rhs: &[T]) -> bool {
        self.as_slice() == rhs
    }
}

impl<T: Eq> Eq for DynVec<'_, T> {}

impl<T: PartialOrd> PartialOrd for DynVec<'_, T> {
    #[inline]
    fn partial_cmp(&self, rhs: &Self) -> Option<Ordering> {
        self.as_slice().partial_cmp(rhs.as_slice())
    }
}

impl<T: Ord> Ord for DynVec<'_, T> {
    #[inline]
    fn cmp(&self, rhs: &Self) -> Ordering {
        self.as_slice().cmp(rhs.as_slice())
    }
}

impl<T: Hash> Hash for DynVec<'_, T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash exactly the same way a slice would, so borrowed lookup keys hash identically.
        self.as_slice().hash(state);
    }
}

impl<T> Index<usize> for DynVec<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("Index {index} out of bounds (len {})", self.len()),
        }
    }
}

impl<T> IndexMut<usize> for DynVec<'_, T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len();
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("Index {index} out of bounds (len {len})"),
        }
    }
}

impl<T> Deref for DynVec<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for DynVec<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> AsRef<[T]> for DynVec<'_, T> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> AsMut<[T]> for DynVec<'_, T> {
    #[inline]
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> Borrow<[T]> for DynVec<'_, T> {
    #[inline]
    fn borrow(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> BorrowMut<[T]> for DynVec<'_, T> {
    #[inline]
    fn borrow_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<'a, 'v, T> IntoIterator for &'v DynVec<'a, T> {
    type Item = &'v T;
    type IntoIter = slice::Iter<'v, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, 'v, T> IntoIterator for &'v mut DynVec<'a, T> {
    type Item = &'v mut T;
    type IntoIter = slice::IterMut<'v, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
