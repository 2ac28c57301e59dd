use std::sync::{
    Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError,
};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` provides synchronized access to a value of type `T` that can be shared
/// across threads. It uses an `Arc<RwLock<T>>` internally to manage concurrent access.
/// Every resident chunk lives in one of these, so the render thread can read one
/// chunk while the background worker writes another.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, must be `Send + Sync`
///
/// # Examples
///
/// ```
/// use voxel_world::core::MtResource;
///
/// let counter = MtResource::new(0);
/// let counter_clone = counter.clone();
///
/// let handle = std::thread::spawn(move || {
///     *counter_clone.get_mut() += 1;
/// });
///
/// handle.join().unwrap();
/// assert_eq!(*counter.get(), 1);
/// ```
///
/// # Poisoning
/// A panic while a guard is held poisons the lock. The contained value is still
/// handed out afterwards; chunk data stays structurally valid across a panic
/// because every write replaces whole fields.
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read-only guard, blocking while a writer holds the lock.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a mutable guard, blocking until all other guards are released.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a read-only guard if one is available without waiting.
    ///
    /// # Returns
    /// `None` if a writer currently holds the lock.
    pub fn try_get(&self) -> Option<RwLockReadGuard<'_, T>> {
        match self.resource.try_read() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Returns true if both handles point at the same underlying value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_get_fails_while_writer_holds_lock() {
        let resource = MtResource::new(5u32);
        let writer = resource.get_mut();
        assert!(resource.try_get().is_none());
        drop(writer);
        assert_eq!(*resource.try_get().expect("lock is free"), 5);
    }

    #[test]
    fn clones_share_the_value() {
        let resource = MtResource::new(vec![1, 2]);
        let other = resource.clone();
        other.get_mut().push(3);
        assert_eq!(resource.get().len(), 3);
        assert!(resource.ptr_eq(&other));
        assert!(!resource.ptr_eq(&MtResource::new(vec![])));
    }

    #[test]
    fn poisoned_lock_still_yields_value() {
        let resource = MtResource::new(1u8);
        let clone = resource.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.get_mut();
            panic!("poison the lock");
        })
        .join();
        assert_eq!(*resource.get(), 1);
    }
}
