//! Maps alternate camera identifiers (Protect MAC addresses) onto the
//! camera id used as the sensor key, so event sources that only know a MAC
//! can still trigger the right sensor.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};

fn normalize_mac(mac: &str) -> String {
    mac.to_lowercase().replace([':', '-'], "")
}

#[derive(Debug, Default)]
pub struct CameraRegistry {
    by_mac: RwLock<HashMap<String, Uuid>>,
}

impl CameraRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mac` (any `:`/`-` separated form) as an alias for
    /// `camera_id`.
    pub fn register(&self, camera_id: Uuid, mac: &str) {
        self.by_mac.write().insert(normalize_mac(mac), camera_id);
    }

    /// Resolves a MAC address or a bare camera id string into a camera id.
    pub fn resolve(&self, id_or_mac: &str) -> Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(id_or_mac) {
            return Ok(id);
        }
        self.by_mac
            .read()
            .get(&normalize_mac(id_or_mac))
            .copied()
            .ok_or_else(|| Error::UnknownCamera(id_or_mac.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_bare_uuid_without_registration() {
        let registry = CameraRegistry::new();
        let id = Uuid::new_v4();
        assert_eq!(registry.resolve(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn resolves_registered_mac_regardless_of_separator_style() {
        let registry = CameraRegistry::new();
        let id = Uuid::new_v4();
        registry.register(id, "AA:BB:CC:DD:EE:FF");
        assert_eq!(registry.resolve("aabbccddeeff").unwrap(), id);
        assert_eq!(registry.resolve("AA-BB-CC-DD-EE-FF").unwrap(), id);
    }

    #[test]
    fn unregistered_mac_is_an_error() {
        let registry = CameraRegistry::new();
        assert!(matches!(registry.resolve("00:11:22:33:44:55"), Err(Error::UnknownCamera(_))));
    }
}
