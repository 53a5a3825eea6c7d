#![no_std]

//! This library contains [`DynVec`], a growable array that requests all of its memory through an
//! allocator instance ([`kilnalloc::Allocator`]) bound at construction, and that keeps its
//! size/capacity bookkeeping inline in front of the element buffer, in the same allocation.

mod dynvec;

pub use crate::dynvec::DynVec;
