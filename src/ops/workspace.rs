//! Workspace: the named-blob store operators read inputs from and write
//! outputs into

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::tensor::Tensor;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A type-erased, individually locked value slot
///
/// Blobs usually hold tensors, but any `Send + Sync` value fits; operators
/// downcast to the type they expect and fail with `BlobTypeMismatch` when
/// the content is something else.
#[derive(Default)]
pub struct Blob {
    value: Option<Box<dyn Any + Send + Sync>>,
}

impl Blob {
    /// Create an empty blob
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the blob holds no value
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Whether the blob holds a value of type `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.is::<T>())
    }

    /// Borrow the contained value as `T`, if it is one
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.value.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutably borrow the contained value as `T`, if it is one
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.value.as_mut().and_then(|v| v.downcast_mut::<T>())
    }

    /// Replace the contained value
    pub fn set<T: Send + Sync + 'static>(&mut self, value: T) -> &mut T {
        self.value = Some(Box::new(value));
        self.get_mut::<T>().expect("blob was just set")
    }

    /// Borrow the value as `T`, replacing whatever was there if it is not one
    pub fn get_mut_or_insert_with<T, F>(&mut self, init: F) -> &mut T
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if !self.is::<T>() {
            self.value = Some(Box::new(init()));
        }
        self.get_mut::<T>().expect("blob was just initialized")
    }

    /// Drop the contained value
    pub fn reset(&mut self) {
        self.value = None;
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// Named store of blobs
///
/// The external scheduler owns a workspace, feeds operator inputs into it,
/// and reads operator outputs back out. Each blob carries its own lock, so
/// operators resolved against the same workspace can read distinct blobs
/// concurrently.
#[derive(Default)]
pub struct Workspace {
    blobs: HashMap<String, Arc<RwLock<Blob>>>,
}

impl Workspace {
    /// Create an empty workspace
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the blob with the given name, creating an empty one if absent
    pub fn create_blob(&mut self, name: &str) -> Arc<RwLock<Blob>> {
        self.blobs
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Blob::new())))
            .clone()
    }

    /// Get the blob with the given name
    pub fn blob(&self, name: &str) -> Option<Arc<RwLock<Blob>>> {
        self.blobs.get(name).cloned()
    }

    /// Whether a blob with the given name exists
    pub fn has_blob(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }

    /// All blob names, sorted
    pub fn blob_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove the named blob, returning whether it existed
    pub fn remove_blob(&mut self, name: &str) -> bool {
        self.blobs.remove(name).is_some()
    }

    /// Drop all blobs
    pub fn reset(&mut self) {
        self.blobs.clear();
    }

    /// Store host data as a tensor under the given name
    pub fn feed_tensor<R: Runtime, T: Element>(
        &mut self,
        name: &str,
        data: &[T],
        shape: &[usize],
        device: &R::Device,
    ) -> Result<()> {
        let tensor = Tensor::<R>::try_from_slice(data, shape, device)?;
        self.create_blob(name).write().set(tensor);
        Ok(())
    }

    /// Read the named tensor's contents back to the host
    pub fn fetch_tensor<R: Runtime, T: Element>(&self, name: &str) -> Result<Vec<T>> {
        let blob = self.blob(name).ok_or_else(|| Error::BlobMissing {
            name: name.to_string(),
        })?;
        let guard = blob.read();
        let tensor = guard
            .get::<Tensor<R>>()
            .ok_or_else(|| Error::BlobTypeMismatch {
                name: name.to_string(),
            })?;
        tensor.try_to_vec()
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("blobs", &self.blob_names())
            .finish()
    }
}
