//! Size-classed pools of reusable vectors.
//!
//! Classes are powers of two. A rented vector has exactly the requested
//! length but at least the class capacity, so it can go back into the same
//! class when released.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Vectors kept per class; further releases are dropped.
const MAX_PER_CLASS: usize = 8;
const CLASS_COUNT: usize = usize::BITS as usize;

#[derive(Debug)]
pub struct BufferPool<T> {
    classes: Mutex<Vec<Vec<Vec<T>>>>,
}

impl<T> Default for BufferPool<T> {
    fn default() -> Self {
        Self {
            classes: Mutex::new((0..CLASS_COUNT).map(|_| Vec::new()).collect()),
        }
    }
}

fn class_of(len: usize) -> usize {
    len.max(1).next_power_of_two().trailing_zeros() as usize
}

impl<T: Clone + Default> BufferPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a vector of `len` default values.
    pub fn rent(&self, len: usize) -> Vec<T> {
        let class = class_of(len);
        let reused = self
            .classes
            .lock()
            .ok()
            .and_then(|mut classes| classes.get_mut(class).and_then(Vec::pop));
        match reused {
            Some(mut vec) => {
                vec.clear();
                vec.resize(len, T::default());
                vec
            }
            None => {
                let mut vec = Vec::with_capacity(len.max(1).next_power_of_two());
                vec.resize(len, T::default());
                vec
            }
        }
    }

    /// Hands a vector back. Vectors too small for their class are dropped.
    pub fn release(&self, vec: Vec<T>) {
        if vec.capacity() == 0 {
            return;
        }
        // Largest class whose every request this capacity can serve.
        let class = usize::BITS as usize - 1 - vec.capacity().leading_zeros() as usize;
        if let Ok(mut classes) = self.classes.lock() {
            if let Some(slot) = classes.get_mut(class) {
                if slot.len() < MAX_PER_CLASS {
                    slot.push(vec);
                }
            }
        }
    }

    /// Rents a vector that goes back to the pool when dropped.
    pub fn rent_scoped(&self, len: usize) -> Pooled<'_, T> {
        Pooled {
            pool: self,
            vec: self.rent(len),
        }
    }

    /// Number of idle vectors, summed over classes.
    pub fn idle(&self) -> usize {
        self.classes
            .lock()
            .map(|classes| classes.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

/// A rented vector that releases itself on drop.
pub struct Pooled<'p, T: Clone + Default> {
    pool: &'p BufferPool<T>,
    vec: Vec<T>,
}

impl<T: Clone + Default> Deref for Pooled<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.vec
    }
}

impl<T: Clone + Default> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.vec
    }
}

impl<T: Clone + Default> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.vec));
    }
}
