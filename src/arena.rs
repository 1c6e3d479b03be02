//! Pre-allocated scratch space for decomposition algorithms.
//!
//! The arena owns two pools: one for message bytes and one for integer
//! metadata (counts and displacements). Each pool hands out at most two
//! regions at a time. Slot 1 starts at the pool base and fixes the boundary
//! where slot 2 begins, so both regions are disjoint and can be borrowed
//! mutably together via [`Pool::pair_mut`].

use crate::error::{Result, TuneError};
use crate::types::Count;
use std::ops::{Deref, DerefMut};

/// Default capacity of the message pool.
pub const DEFAULT_MSG_BUFFER_BYTES: usize = 100_000_000;

/// Default capacity of the integer pool.
pub const DEFAULT_INT_BUFFER_BYTES: usize = 10_000;

/// Which pool a grab or release targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Msg,
    Int,
}

/// One of the two regions a pool can grant concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    fn number(self) -> u8 {
        match self {
            Slot::First => 1,
            Slot::Second => 2,
        }
    }
}

/// A granted region, in elements of the pool's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    slot: Slot,
    offset: usize,
    len: usize,
}

impl Region {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// A fixed-capacity pool with two bump-allocated slots.
pub struct Pool<T> {
    name: &'static str,
    data: Vec<T>,
    first_in_use: bool,
    second_in_use: bool,
    boundary: usize,
}

impl<T: Copy + Default> Pool<T> {
    /// Allocate a pool holding `capacity_bytes / size_of::<T>()` elements.
    pub fn allocate(name: &'static str, capacity_bytes: usize) -> Result<Self> {
        let elems = capacity_bytes / std::mem::size_of::<T>();
        let mut data = Vec::new();
        data.try_reserve_exact(elems)
            .map_err(|_| TuneError::AllocationFailure {
                pool: name,
                bytes: capacity_bytes,
            })?;
        data.resize(elems, T::default());
        Ok(Self {
            name,
            data,
            first_in_use: false,
            second_in_use: false,
            boundary: 0,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn capacity_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }

    pub fn is_in_use(&self, slot: Slot) -> bool {
        match slot {
            Slot::First => self.first_in_use,
            Slot::Second => self.second_in_use,
        }
    }

    /// Grant `slot` with room for `size_bytes` bytes, rounded up to whole
    /// elements.
    ///
    /// Fails with `NoSpaceLeft` if the slot is held or the region does not
    /// fit. Slot 1 is also refused while slot 2 is held, since slot 2 was
    /// placed against the previous boundary.
    pub fn grab(&mut self, slot: Slot, size_bytes: usize) -> Result<Region> {
        let elems = size_bytes.div_ceil(std::mem::size_of::<T>());
        let (held, offset) = match slot {
            Slot::First => (self.first_in_use || self.second_in_use, 0),
            Slot::Second => (self.second_in_use, self.boundary),
        };
        let available = if held {
            0
        } else {
            self.data.len().saturating_sub(offset)
        };
        if held || elems > available {
            return Err(TuneError::NoSpaceLeft {
                pool: self.name,
                slot: slot.number(),
                requested: elems,
                available,
            });
        }
        match slot {
            Slot::First => {
                self.first_in_use = true;
                self.boundary = elems;
            }
            Slot::Second => self.second_in_use = true,
        }
        Ok(Region {
            slot,
            offset,
            len: elems,
        })
    }

    /// Return both slots to the pool.
    pub fn release(&mut self) {
        self.first_in_use = false;
        self.second_in_use = false;
        self.boundary = 0;
    }

    pub fn slice(&self, region: Region) -> &[T] {
        &self.data[region.offset..region.end()]
    }

    pub fn slice_mut(&mut self, region: Region) -> &mut [T] {
        &mut self.data[region.offset..region.end()]
    }

    /// Borrow a slot-1 region and a slot-2 region at the same time.
    pub fn pair_mut(&mut self, first: Region, second: Region) -> (&mut [T], &mut [T]) {
        debug_assert!(first.end() <= second.offset, "regions overlap");
        let (head, tail) = self.data.split_at_mut(second.offset);
        (
            &mut head[first.offset..first.end()],
            &mut tail[..second.len],
        )
    }
}

/// Process-local scratch arena shared by every decomposition algorithm.
pub struct BufferArena {
    msg: Pool<u8>,
    ints: Pool<Count>,
}

impl BufferArena {
    /// Allocate both pools. Fails with `AllocationFailure` if either
    /// allocation cannot be satisfied.
    pub fn new(max_msg_bytes: usize, max_int_bytes: usize) -> Result<Self> {
        Ok(Self {
            msg: Pool::allocate("msg", max_msg_bytes)?,
            ints: Pool::allocate("int", max_int_bytes)?,
        })
    }

    pub fn grab_slot(&mut self, pool: PoolKind, slot: Slot, size_bytes: usize) -> Result<Region> {
        match pool {
            PoolKind::Msg => self.msg.grab(slot, size_bytes),
            PoolKind::Int => self.ints.grab(slot, size_bytes),
        }
    }

    pub fn release_slots(&mut self, pool: PoolKind) {
        match pool {
            PoolKind::Msg => self.msg.release(),
            PoolKind::Int => self.ints.release(),
        }
    }

    pub fn msg(&self) -> &Pool<u8> {
        &self.msg
    }

    pub fn ints(&self) -> &Pool<Count> {
        &self.ints
    }

    /// Borrow the arena for the duration of one algorithm run. Both pools
    /// are released when the lease drops, on every exit path.
    pub fn lease(&mut self) -> ArenaLease<'_> {
        ArenaLease { arena: self }
    }
}

/// Scoped borrow of a [`BufferArena`] that releases all slots on drop.
pub struct ArenaLease<'a> {
    arena: &'a mut BufferArena,
}

impl ArenaLease<'_> {
    pub fn msg(&mut self) -> &mut Pool<u8> {
        &mut self.arena.msg
    }

    pub fn ints(&mut self) -> &mut Pool<Count> {
        &mut self.arena.ints
    }

    /// Both pools at once, for algorithms that need metadata and scratch
    /// bytes together.
    pub fn pools(&mut self) -> (&mut Pool<u8>, &mut Pool<Count>) {
        (&mut self.arena.msg, &mut self.arena.ints)
    }
}

impl Deref for ArenaLease<'_> {
    type Target = BufferArena;

    fn deref(&self) -> &BufferArena {
        self.arena
    }
}

impl DerefMut for ArenaLease<'_> {
    fn deref_mut(&mut self) -> &mut BufferArena {
        self.arena
    }
}

impl Drop for ArenaLease<'_> {
    fn drop(&mut self) {
        self.arena.msg.release();
        self.arena.ints.release();
    }
}
