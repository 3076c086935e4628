//! Process-wide map from allocated device pointers to their owning device
//!
//! Every device allocation is registered here by the runtime that performed
//! it and removed again when the memory is freed. Lookups resolve interior
//! pointers by address range. A pointer that was never produced by a device
//! allocation is an error, never a default.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug)]
struct Registration {
    size: usize,
    device_id: usize,
}

/// Thread-safe pointer-to-device map
///
/// Insertions and removals are serialized against lookups, so a reader never
/// observes a partially-inserted entry.
#[derive(Debug, Default)]
pub struct PointerRegistry {
    entries: RwLock<BTreeMap<u64, Registration>>,
}

impl PointerRegistry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Record that `ptr` was allocated on device `device_id`
    ///
    /// Null pointers and zero-sized allocations are ignored.
    pub fn register(&self, ptr: u64, size: usize, device_id: usize) {
        if ptr == 0 || size == 0 {
            return;
        }
        self.entries
            .write()
            .insert(ptr, Registration { size, device_id });
    }

    /// Drop the entry for `ptr`, returning whether one existed
    pub fn unregister(&self, ptr: u64) -> bool {
        self.entries.write().remove(&ptr).is_some()
    }

    /// Resolve the device index owning `ptr`
    ///
    /// `ptr` may point anywhere inside a registered allocation.
    pub fn device_for_pointer(&self, ptr: u64) -> Result<usize> {
        let entries = self.entries.read();
        if let Some((&base, registration)) = entries.range(..=ptr).next_back() {
            if ptr < base + registration.size as u64 {
                return Ok(registration.device_id);
            }
        }
        Err(Error::UnknownDevicePointer { ptr })
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no allocations are registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// The process-wide registry instance
pub fn pointer_registry() -> &'static PointerRegistry {
    static REGISTRY: PointerRegistry = PointerRegistry::new();
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = PointerRegistry::new();
        registry.register(0x1000, 256, 0);
        registry.register(0x2000, 128, 1);

        assert_eq!(registry.device_for_pointer(0x1000).unwrap(), 0);
        assert_eq!(registry.device_for_pointer(0x2000).unwrap(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_interior_pointer_resolves_to_owner() {
        let registry = PointerRegistry::new();
        registry.register(0x1000, 256, 3);

        assert_eq!(registry.device_for_pointer(0x10ff).unwrap(), 3);
        // One past the end belongs to nobody.
        assert!(matches!(
            registry.device_for_pointer(0x1100),
            Err(Error::UnknownDevicePointer { ptr: 0x1100 })
        ));
    }

    #[test]
    fn test_unknown_pointer_is_an_error() {
        let registry = PointerRegistry::new();
        assert!(matches!(
            registry.device_for_pointer(0xdead),
            Err(Error::UnknownDevicePointer { ptr: 0xdead })
        ));
    }

    #[test]
    fn test_unregister_removes_entry() {
        let registry = PointerRegistry::new();
        registry.register(0x1000, 64, 0);

        assert!(registry.unregister(0x1000));
        assert!(!registry.unregister(0x1000));
        assert!(registry.device_for_pointer(0x1000).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_null_and_zero_sized_ignored() {
        let registry = PointerRegistry::new();
        registry.register(0, 64, 0);
        registry.register(0x1000, 0, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_and_resolve() {
        let registry = PointerRegistry::new();

        std::thread::scope(|scope| {
            for thread in 0..8u64 {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..100u64 {
                        let ptr = (thread + 1) * 0x10_0000 + i * 0x100;
                        registry.register(ptr, 0x100, thread as usize);
                        assert_eq!(
                            registry.device_for_pointer(ptr + 0x80).unwrap(),
                            thread as usize
                        );
                    }
                });
            }
        });

        assert_eq!(registry.len(), 800);
    }
}
