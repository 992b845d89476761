//! SharedParam - named, lockable state shared between units
//!
//! Access goes through a scoped guard: the lock is released when the guard
//! drops, on every exit path. The mutex is not reentrant; taking a second
//! guard on the same parameter from the same thread while the first is alive
//! deadlocks. Use [`SharedParam::try_lock_for`] where that risk exists.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::status::Status;

/// Payload stored in a shared parameter.
///
/// `reset` is called by the pipeline between consecutive runs, with the
/// status of the run that just finished. It never overlaps unit bodies.
pub trait Param: Send + 'static {
    fn reset(&mut self, _prior: &Status) {}
}

/// Typed handle to a registered parameter (cheap to clone, not a copy)
pub struct SharedParam<T> {
    name: Arc<str>,
    cell: Arc<Mutex<T>>,
}

impl<T> Clone for SharedParam<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for SharedParam<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedParam")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Param> SharedParam<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire exclusive access; released when the guard drops.
    ///
    /// Not reentrant. Unlike a lock/unlock pair, a guard cannot be left
    /// locked by an early return, but calling `lock` again on the same
    /// parameter (through this or any cloned handle) while a guard from the
    /// same thread is alive blocks forever. Drop the first guard, or use
    /// [`try_lock_for`](Self::try_lock_for) when a nested acquisition is
    /// possible.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.cell.lock()
    }

    /// Acquire exclusive access, giving up after `timeout`
    pub fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, T>> {
        self.cell.try_lock_for(timeout)
    }

    /// Run `f` with the lock held
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.cell.lock();
        f(&mut guard)
    }

    /// Two handles refer to the same parameter
    pub fn same_as(&self, other: &SharedParam<T>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

/// Type-erased registry slot
pub(crate) trait ErasedParam: Send + Sync {
    fn reset(&self, prior: &Status);
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct ParamSlot<T> {
    name: Arc<str>,
    cell: Arc<Mutex<T>>,
}

impl<T: Param> ParamSlot<T> {
    pub(crate) fn new(name: Arc<str>, value: T) -> Self {
        Self {
            name,
            cell: Arc::new(Mutex::new(value)),
        }
    }

    pub(crate) fn handle(&self) -> SharedParam<T> {
        SharedParam {
            name: Arc::clone(&self.name),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Param> ErasedParam for ParamSlot<T> {
    fn reset(&self, prior: &Status) {
        self.cell.lock().reset(prior);
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
