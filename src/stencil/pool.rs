//! Reuse pools for per-render state and compile-time scratch space
//!
//! Pools are process-wide and keyed by the pooled type, never by template. An object handed out
//! by [`Pool::acquire`] belongs to the holder until its [`Pooled`] guard drops; the guard resets
//! it and puts it back on every exit path, including early returns with an error.
//!
//! Each pool retains at most a fixed number of idle objects, and objects that grew past their
//! size cap are dropped instead of retained.

use crate::stencil::accessor::{Pipe, Step};
use crate::stencil::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Local-variable bindings of a render (`let` and loop variables)
pub type Bindings = HashMap<Arc<str>, Value>;

/// Objects that can be cleared and handed out again
pub trait Reusable: Default + Send {
    fn reset(&mut self);

    /// Whether the object grew too large to be worth retaining
    fn is_oversized(&self) -> bool {
        false
    }
}

const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

impl<T: Send> Reusable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }

    fn is_oversized(&self) -> bool {
        self.capacity() * std::mem::size_of::<T>().max(1) > MAX_RETAINED_CAPACITY
    }
}

impl Reusable for String {
    fn reset(&mut self) {
        self.clear();
    }

    fn is_oversized(&self) -> bool {
        self.capacity() > MAX_RETAINED_CAPACITY
    }
}

impl Reusable for Bindings {
    fn reset(&mut self) {
        self.clear();
    }
}

/// A free list of reusable objects
pub struct Pool<T: Reusable> {
    free: Mutex<Vec<T>>,
    retain: usize,
}

impl<T: Reusable> Pool<T> {
    pub const fn new(retain: usize) -> Self {
        Self {
            free: parking_lot::const_mutex(Vec::new()),
            retain,
        }
    }

    /// Take an object out of the pool, or build a fresh one when the pool is empty
    pub fn acquire(&self) -> Pooled<'_, T> {
        let item = self.free.lock().pop().unwrap_or_default();
        Pooled { pool: self, item }
    }

    /// Number of idle objects currently retained
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, mut item: T) {
        if item.is_oversized() {
            return;
        }
        item.reset();
        let mut free = self.free.lock();
        if free.len() < self.retain {
            free.push(item);
        }
    }
}

/// Exclusive handle on a pooled object; returns it to its pool on drop
pub struct Pooled<'p, T: Reusable> {
    pool: &'p Pool<T>,
    item: T,
}

impl<T: Reusable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Reusable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Reusable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.item));
    }
}

const RETAINED: usize = 64;

pub(crate) static BINDINGS: Pool<Bindings> = Pool::new(RETAINED);
pub(crate) static BUFFERS: Pool<Vec<u8>> = Pool::new(RETAINED);
pub(crate) static TEXT: Pool<String> = Pool::new(RETAINED);
pub(crate) static STEPS: Pool<Vec<Step>> = Pool::new(RETAINED);
pub(crate) static PIPES: Pool<Vec<Pipe>> = Pool::new(RETAINED);
pub(crate) static ARGS: Pool<Vec<Box<str>>> = Pool::new(RETAINED);
