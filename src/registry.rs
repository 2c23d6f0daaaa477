//! Process-wide registry
//!
//! Holds the object type schemas, session parameters, the default string
//! converter and the time zone region table. Writers swap a new
//! `Arc<RegistryData>` in under the lock; readers clone the `Arc` and look
//! values up without holding it. A [`Session`](crate::session::Session)
//! keeps one such clone as its [`RegistrySnapshot`], so registrations made
//! after it was created are only seen by later sessions.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::charset::StringConverter;
use crate::error::{Error, Result};
use crate::types::ObjectSchema;

#[derive(Debug, Clone, Default)]
struct RegistryData {
    schemas: HashMap<String, Arc<ObjectSchema>>,
    parameters: HashMap<String, String>,
    default_charset: Option<u16>,
    regions: HashMap<u16, String>,
    region_ids: HashMap<String, u16>,
}

impl RegistryData {
    fn schema(&self, name: &str) -> Result<Arc<ObjectSchema>> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotRegistered(name.to_string()))
    }

    fn default_converter(&self) -> StringConverter {
        self.default_charset
            .map(StringConverter::for_charset)
            .unwrap_or_default()
    }
}

static REGISTRY: OnceLock<RwLock<Arc<RegistryData>>> = OnceLock::new();

fn registry() -> &'static RwLock<Arc<RegistryData>> {
    REGISTRY.get_or_init(Default::default)
}

// A writer that panicked left either the old or the new Arc in place,
// both complete, so poisoning is ignored.
fn current() -> Arc<RegistryData> {
    let guard = registry().read().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(&guard)
}

fn update(f: impl FnOnce(&mut RegistryData)) {
    let mut guard = registry().write().unwrap_or_else(PoisonError::into_inner);
    f(Arc::make_mut(&mut guard));
}

/// Register (or replace) an object type schema under its name
pub fn register_schema(schema: ObjectSchema) {
    debug!(name = %schema.name, collection = schema.is_collection(), "registering object schema");
    update(|data| {
        data.schemas.insert(schema.name.clone(), Arc::new(schema));
    });
}

/// Remove a schema, returning whether it was registered
pub fn unregister_schema(name: &str) -> bool {
    let mut removed = false;
    update(|data| removed = data.schemas.remove(name).is_some());
    removed
}

/// Look up a schema by type name
pub fn schema(name: &str) -> Result<Arc<ObjectSchema>> {
    current().schema(name)
}

/// Set a session parameter
pub fn set_session_parameter(name: impl Into<String>, value: impl Into<String>) {
    let (name, value) = (name.into(), value.into());
    update(|data| {
        data.parameters.insert(name, value);
    });
}

/// Remove a session parameter, returning whether it was set
pub fn remove_session_parameter(name: &str) -> bool {
    let mut removed = false;
    update(|data| removed = data.parameters.remove(name).is_some());
    removed
}

/// Value of a session parameter
pub fn session_parameter(name: &str) -> Option<String> {
    current().parameters.get(name).cloned()
}

/// Charset used for text columns that carry no charset of their own
pub fn set_default_charset(charset_id: u16) {
    update(|data| data.default_charset = Some(charset_id));
}

/// Converter for the default charset, AL32UTF8 unless changed
pub fn default_converter() -> StringConverter {
    current().default_converter()
}

/// Map a time zone region id to its name
pub fn register_time_zone_region(id: u16, name: impl Into<String>) {
    let name = name.into();
    update(|data| {
        if let Some(old) = data.regions.insert(id, name.clone()) {
            data.region_ids.remove(&old);
        }
        data.region_ids.insert(name, id);
    });
}

/// Name of a time zone region
pub fn time_zone_region(id: u16) -> Option<String> {
    current().regions.get(&id).cloned()
}

/// Id of a time zone region
pub fn time_zone_region_id(name: &str) -> Option<u16> {
    current().region_ids.get(name).copied()
}

/// Immutable view of the registry at one point in time
pub fn snapshot() -> RegistrySnapshot {
    RegistrySnapshot { data: current() }
}

/// Registry contents captured by [`snapshot`]
///
/// Two snapshots are equal when they share the same captured contents.
#[derive(Clone)]
pub struct RegistrySnapshot {
    data: Arc<RegistryData>,
}

impl std::fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("schemas", &self.data.schemas.len())
            .field("parameters", &self.data.parameters.len())
            .field("regions", &self.data.regions.len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for RegistrySnapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for RegistrySnapshot {}

impl RegistrySnapshot {
    /// Look up a schema by type name
    pub fn schema(&self, name: &str) -> Result<Arc<ObjectSchema>> {
        self.data.schema(name)
    }

    /// Value of a session parameter
    pub fn session_parameter(&self, name: &str) -> Option<&str> {
        self.data.parameters.get(name).map(String::as_str)
    }

    /// Every session parameter, sorted by name
    pub fn session_parameters(&self) -> Vec<(&str, &str)> {
        let mut parameters: Vec<(&str, &str)> = self
            .data
            .parameters
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        parameters.sort_unstable();
        parameters
    }

    /// Converter for the default charset
    pub fn default_converter(&self) -> StringConverter {
        self.data.default_converter()
    }

    /// Name of a time zone region
    pub fn time_zone_region(&self, id: u16) -> Option<&str> {
        self.data.regions.get(&id).map(String::as_str)
    }

    /// Id of a time zone region
    pub fn time_zone_region_id(&self, name: &str) -> Option<u16> {
        self.data.region_ids.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{charset, collection_type};
    use crate::types::{TypeDescriptor, WireType};

    fn schema_named(name: &str) -> ObjectSchema {
        ObjectSchema::collection(
            name,
            collection_type::VARRAY,
            TypeDescriptor::new(WireType::Number),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        register_schema(schema_named("REGISTRY_TEST.LOOKUP"));
        let found = schema("REGISTRY_TEST.LOOKUP").unwrap();
        assert!(found.is_collection());
        assert!(matches!(
            schema("REGISTRY_TEST.NOPE"),
            Err(Error::NotRegistered(name)) if name == "REGISTRY_TEST.NOPE"
        ));
        assert!(unregister_schema("REGISTRY_TEST.LOOKUP"));
        assert!(!unregister_schema("REGISTRY_TEST.LOOKUP"));
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let before = snapshot();
        register_schema(schema_named("REGISTRY_TEST.LATE"));
        set_session_parameter("REGISTRY_TEST_PARAM", "1");
        assert!(before.schema("REGISTRY_TEST.LATE").is_err());
        assert_eq!(before.session_parameter("REGISTRY_TEST_PARAM"), None);

        let after = snapshot();
        assert!(after.schema("REGISTRY_TEST.LATE").is_ok());
        assert_eq!(after.session_parameter("REGISTRY_TEST_PARAM"), Some("1"));
        assert_eq!(session_parameter("REGISTRY_TEST_PARAM").as_deref(), Some("1"));
        assert!(after
            .session_parameters()
            .contains(&("REGISTRY_TEST_PARAM", "1")));

        assert!(remove_session_parameter("REGISTRY_TEST_PARAM"));
        assert!(!remove_session_parameter("REGISTRY_TEST_PARAM"));
        assert_eq!(after.session_parameter("REGISTRY_TEST_PARAM"), Some("1"));
        assert_eq!(snapshot().session_parameter("REGISTRY_TEST_PARAM"), None);
    }

    #[test]
    fn test_snapshot_identity() {
        let first = snapshot();
        assert_eq!(first.clone(), first);
        register_schema(schema_named("REGISTRY_TEST.IDENTITY"));
        assert_ne!(snapshot(), first);
    }

    #[test]
    fn test_time_zone_regions() {
        register_time_zone_region(0x7001, "Registry/Test_One");
        assert_eq!(time_zone_region(0x7001).as_deref(), Some("Registry/Test_One"));
        assert_eq!(time_zone_region_id("Registry/Test_One"), Some(0x7001));

        register_time_zone_region(0x7001, "Registry/Test_Two");
        assert_eq!(time_zone_region_id("Registry/Test_One"), None);
        assert_eq!(snapshot().time_zone_region(0x7001), Some("Registry/Test_Two"));
    }

    #[test]
    fn test_default_converter() {
        // other tests rely on the UTF-8 default, so only the snapshot data
        // is given a different charset
        set_default_charset(charset::AL32UTF8);
        assert_eq!(default_converter().charset_id(), charset::AL32UTF8);

        let latin = RegistrySnapshot {
            data: Arc::new(RegistryData {
                default_charset: Some(charset::WE8ISO8859P1),
                ..Default::default()
            }),
        };
        assert_eq!(latin.default_converter(), StringConverter::Latin1);
    }

    #[test]
    fn test_concurrent_readers() {
        register_schema(schema_named("REGISTRY_TEST.SHARED"));
        let readers: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    for j in 0..200 {
                        assert!(schema("REGISTRY_TEST.SHARED").is_ok());
                        if i == 0 {
                            register_schema(schema_named(&format!("REGISTRY_TEST.W{}", j)));
                        }
                    }
                })
            })
            .collect();
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(schema("REGISTRY_TEST.W199").is_ok());
    }
}
