//! Bridge-wide status surfaced to operators: pairing state, sensor counts
//! and a coarse connectivity check. The accessory protocol itself (mDNS
//! advertising, HAP pairing) lives outside this crate's scope — this is
//! the state the rest of the pipeline reports against.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Tracks whether the bridge is advertising and how many sensors of each
/// kind are registered, for a `/diagnostics`-style endpoint.
#[derive(Default)]
pub struct BridgeDiagnostics {
    advertising: AtomicBool,
    paired: AtomicBool,
    motion_count: AtomicU32,
    occupancy_count: AtomicU32,
    vehicle_count: AtomicU32,
    animal_count: AtomicU32,
    package_count: AtomicU32,
    carrier_count: AtomicU32,
    doorbell_count: AtomicU32,
}

/// Point-in-time snapshot of [`BridgeDiagnostics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub advertising: bool,
    pub paired: bool,
    pub motion_count: u32,
    pub occupancy_count: u32,
    pub vehicle_count: u32,
    pub animal_count: u32,
    pub package_count: u32,
    pub carrier_count: u32,
    pub doorbell_count: u32,
}

impl BridgeDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_advertising(&self, value: bool) {
        self.advertising.store(value, Ordering::Relaxed);
    }

    pub fn set_paired(&self, value: bool) {
        self.paired.store(value, Ordering::Relaxed);
    }

    pub fn register_motion(&self) {
        self.motion_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn register_occupancy(&self) {
        self.occupancy_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn register_vehicle(&self) {
        self.vehicle_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn register_animal(&self) {
        self.animal_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn register_package(&self) {
        self.package_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn register_carrier(&self) {
        self.carrier_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn register_doorbell(&self) {
        self.doorbell_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            advertising: self.advertising.load(Ordering::Relaxed),
            paired: self.paired.load(Ordering::Relaxed),
            motion_count: self.motion_count.load(Ordering::Relaxed),
            occupancy_count: self.occupancy_count.load(Ordering::Relaxed),
            vehicle_count: self.vehicle_count.load(Ordering::Relaxed),
            animal_count: self.animal_count.load(Ordering::Relaxed),
            package_count: self.package_count.load(Ordering::Relaxed),
            carrier_count: self.carrier_count.load(Ordering::Relaxed),
            doorbell_count: self.doorbell_count.load(Ordering::Relaxed),
        }
    }
}
