//! A process-wide registry of extension types, consulted when reading IPC schemas.
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;

use super::DataType;
use crate::error::{Error, Result};

/// Reserved field metadata key holding the name of an extension type
pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";
/// Reserved field metadata key holding the serialized payload of an extension type
pub const EXTENSION_METADATA_KEY: &str = "ARROW:extension:metadata";

/// A user-defined logical type stored as a [`DataType`] the format knows about.
pub trait ExtensionType: std::fmt::Debug + Send + Sync {
    /// The unique name of this extension, as written in [`EXTENSION_NAME_KEY`].
    fn name(&self) -> &str;

    /// Whether `storage` (with the serialized `metadata`) is a valid representation of this
    /// extension. Types that fail this check are read as their storage type.
    fn accepts(&self, storage: &DataType, metadata: Option<&str>) -> bool {
        let _ = (storage, metadata);
        true
    }
}

type ExtensionRegistry = RwLock<BTreeMap<String, Arc<dyn ExtensionType>>>;

lazy_static! {
    static ref EXTENSION_REGISTRY: ExtensionRegistry = RwLock::new(BTreeMap::new());
}

/// Registers `extension` so that readers wrap fields annotated with its name in a
/// [`DataType::Extension`].
/// # Errors
/// Errors iff the extension's name is empty or the registry is poisoned.
pub fn register_extension_type(extension: Arc<dyn ExtensionType>) -> Result<()> {
    if extension.name().is_empty() {
        return Err(Error::InvalidArgumentError(
            "An extension type must have a non-empty name".to_string(),
        ));
    }
    let mut map = EXTENSION_REGISTRY
        .write()
        .map_err(|_| Error::oos("The extension registry is poisoned"))?;
    map.insert(extension.name().to_string(), extension);
    Ok(())
}

/// Removes the extension type named `name` from the registry, returning it if it existed.
pub fn unregister_extension_type(name: &str) -> Option<Arc<dyn ExtensionType>> {
    EXTENSION_REGISTRY.write().ok()?.remove(name)
}

/// Returns the registered extension type named `name`, if any.
pub fn get_extension_type(name: &str) -> Option<Arc<dyn ExtensionType>> {
    EXTENSION_REGISTRY.read().ok()?.get(name).cloned()
}
