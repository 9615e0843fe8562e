//! Camera resource management for posecam
//!
//! Capture devices are singleton host resources: while one stream holds a
//! camera, the host refuses to hand it out again. This module models that with
//! leases. A host takes a [`DeviceLease`] before it opens a device and the
//! lease travels with the stream's track; the device is free again once the
//! lease is released (explicitly or on drop).

use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Resource limits configuration
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum concurrent leases on a single device (None = unlimited)
    pub max_leases_per_device: Option<u32>,
    /// Maximum devices held at once across the process (None = unlimited)
    pub max_devices: Option<u32>,
}

impl ResourceLimits {
    /// One holder per device, the way camera hardware behaves on most hosts
    pub fn exclusive() -> Self {
        Self {
            max_leases_per_device: Some(1),
            max_devices: None,
        }
    }

    /// Allow up to `max` concurrent holders per device
    pub fn shared(max: u32) -> Self {
        Self {
            max_leases_per_device: Some(max),
            max_devices: None,
        }
    }

    /// No limits (testing only)
    pub fn unlimited() -> Self {
        Self {
            max_leases_per_device: None,
            max_devices: None,
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::exclusive()
    }
}

/// Snapshot of lease bookkeeping
#[derive(Debug, Clone)]
pub struct ResourceUsage {
    /// Leases currently outstanding
    pub active_leases: u32,
    /// Devices with at least one outstanding lease
    pub devices_in_use: u32,
    /// Leases granted since creation
    pub total_acquired: u64,
    /// Leases returned since creation
    pub total_released: u64,
    /// Requests refused because of limits
    pub rejected: u64,
    /// Timestamp when usage was measured
    pub measured_at: Instant,
}

impl Default for ResourceUsage {
    fn default() -> Self {
        Self {
            active_leases: 0,
            devices_in_use: 0,
            total_acquired: 0,
            total_released: 0,
            rejected: 0,
            measured_at: Instant::now(),
        }
    }
}

/// Resource warning types
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceWarning {
    /// A lease request was refused because the device is already held
    DeviceBusy {
        /// Device identifier
        device_id: String,
        /// Number of outstanding leases
        holders: u32,
        /// Configured per-device limit
        limit: u32,
    },
    /// A lease request was refused because too many devices are held
    DeviceLimitReached {
        /// Devices currently held
        current: u32,
        /// Configured device limit
        limit: u32,
    },
    /// A lease has been outstanding longer than expected
    StaleLease {
        /// Device identifier
        device_id: String,
        /// How long the lease has been held
        held_for: Duration,
    },
}

impl ResourceWarning {
    /// Get severity level of the warning
    pub fn severity(&self) -> WarningSeverity {
        match self {
            ResourceWarning::DeviceBusy { .. } => WarningSeverity::High,
            ResourceWarning::DeviceLimitReached { .. } => WarningSeverity::Medium,
            ResourceWarning::StaleLease { held_for, .. } => {
                if *held_for >= Duration::from_secs(600) {
                    WarningSeverity::High
                } else {
                    WarningSeverity::Low
                }
            }
        }
    }

    /// Get recommended action for this warning
    pub fn recommended_action(&self) -> String {
        match self {
            ResourceWarning::DeviceBusy { device_id, .. } => {
                format!("Stop every track captured from {} before reopening it", device_id)
            }
            ResourceWarning::DeviceLimitReached { .. } => {
                "Release idle devices or raise the device limit".to_string()
            }
            ResourceWarning::StaleLease { .. } => {
                "Check that the owning view is still mounted".to_string()
            }
        }
    }
}

/// Warning severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningSeverity {
    /// Low severity warning
    Low,
    /// Medium severity warning
    Medium,
    /// High severity warning
    High,
}

/// Bookkeeping for one outstanding lease
#[derive(Debug, Clone)]
pub struct LeaseInfo {
    /// Lease identifier
    pub id: Uuid,
    /// Device the lease covers
    pub device_id: String,
    /// When the lease was granted
    pub acquired_at: Instant,
}

#[derive(Debug)]
struct ManagerInner {
    limits: RwLock<ResourceLimits>,
    leases: RwLock<HashMap<String, Vec<LeaseInfo>>>,
    usage: RwLock<ResourceUsage>,
    warning_tx: mpsc::UnboundedSender<ResourceWarning>,
}

impl ManagerInner {
    fn release(&self, lease_id: Uuid, device_id: &str) {
        let mut leases = self.leases.write();
        let removed = match leases.get_mut(device_id) {
            Some(held) => {
                let before = held.len();
                held.retain(|info| info.id != lease_id);
                before != held.len()
            }
            None => false,
        };
        if leases.get(device_id).is_some_and(|held| held.is_empty()) {
            leases.remove(device_id);
        }

        if removed {
            let mut usage = self.usage.write();
            usage.active_leases = usage.active_leases.saturating_sub(1);
            usage.devices_in_use = leases.len() as u32;
            usage.total_released += 1;
            usage.measured_at = Instant::now();
            debug!("Released lease {} on {}", lease_id, device_id);
        }
    }
}

/// Lease manager for capture devices
///
/// Cloning yields another handle to the same bookkeeping.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    inner: Arc<ManagerInner>,
}

impl ResourceManager {
    /// Create a new resource manager
    pub fn new(limits: ResourceLimits) -> (Self, mpsc::UnboundedReceiver<ResourceWarning>) {
        let (warning_tx, warning_rx) = mpsc::unbounded_channel();

        let manager = Self {
            inner: Arc::new(ManagerInner {
                limits: RwLock::new(limits),
                leases: RwLock::new(HashMap::new()),
                usage: RwLock::new(ResourceUsage::default()),
                warning_tx,
            }),
        };

        (manager, warning_rx)
    }

    /// Create a manager enforcing one holder per device
    pub fn exclusive() -> (Self, mpsc::UnboundedReceiver<ResourceWarning>) {
        Self::new(ResourceLimits::exclusive())
    }

    /// Lease a device, failing if limits would be exceeded
    pub fn acquire(&self, device_id: &str) -> CoreResult<DeviceLease> {
        let limits = self.inner.limits.read().clone();
        let mut leases = self.inner.leases.write();

        let holders = leases.get(device_id).map_or(0, |held| held.len() as u32);
        if let Some(limit) = limits.max_leases_per_device {
            if holders >= limit {
                self.reject(ResourceWarning::DeviceBusy {
                    device_id: device_id.to_string(),
                    holders,
                    limit,
                });
                return Err(CoreError::ResourceBusy {
                    resource: device_id.to_string(),
                    holders,
                });
            }
        }

        if let Some(limit) = limits.max_devices {
            let current = leases.len() as u32;
            if holders == 0 && current >= limit {
                self.reject(ResourceWarning::DeviceLimitReached { current, limit });
                return Err(CoreError::ResourceBusy {
                    resource: "devices".to_string(),
                    holders: current,
                });
            }
        }

        let info = LeaseInfo {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            acquired_at: Instant::now(),
        };
        leases
            .entry(device_id.to_string())
            .or_default()
            .push(info.clone());

        {
            let mut usage = self.inner.usage.write();
            usage.active_leases += 1;
            usage.devices_in_use = leases.len() as u32;
            usage.total_acquired += 1;
            usage.measured_at = Instant::now();
        }

        info!("Leased device {} ({})", device_id, info.id);
        Ok(DeviceLease {
            info,
            manager: self.inner.clone(),
            released: false,
        })
    }

    fn reject(&self, warning: ResourceWarning) {
        warn!("Lease refused: {:?}", warning);
        self.inner.usage.write().rejected += 1;
        let _ = self.inner.warning_tx.send(warning);
    }

    /// Check whether a device currently has any outstanding lease
    pub fn is_held(&self, device_id: &str) -> bool {
        self.inner.leases.read().contains_key(device_id)
    }

    /// Outstanding leases across all devices
    pub fn outstanding(&self) -> Vec<LeaseInfo> {
        self.inner
            .leases
            .read()
            .values()
            .flat_map(|held| held.iter().cloned())
            .collect()
    }

    /// Report leases held longer than `max_age`
    pub fn check_stale_leases(&self, max_age: Duration) -> Vec<ResourceWarning> {
        let now = Instant::now();
        let warnings: Vec<ResourceWarning> = self
            .outstanding()
            .into_iter()
            .filter_map(|info| {
                let held_for = now.duration_since(info.acquired_at);
                (held_for >= max_age).then_some(ResourceWarning::StaleLease {
                    device_id: info.device_id,
                    held_for,
                })
            })
            .collect();

        for warning in &warnings {
            let _ = self.inner.warning_tx.send(warning.clone());
        }
        warnings
    }

    /// Get current resource usage
    pub fn current_usage(&self) -> ResourceUsage {
        self.inner.usage.read().clone()
    }

    /// Update resource limits
    pub fn update_limits(&self, new_limits: ResourceLimits) {
        *self.inner.limits.write() = new_limits;
        info!("Updated resource limits");
    }

    /// Get current resource limits
    pub fn limits(&self) -> ResourceLimits {
        self.inner.limits.read().clone()
    }
}

/// Exclusive claim on a device, returned to the manager on release or drop
#[derive(Debug)]
pub struct DeviceLease {
    info: LeaseInfo,
    manager: Arc<ManagerInner>,
    released: bool,
}

impl DeviceLease {
    /// Lease identifier
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    /// Device the lease covers
    pub fn device_id(&self) -> &str {
        &self.info.device_id
    }

    /// How long the lease has been held
    pub fn held_for(&self) -> Duration {
        self.info.acquired_at.elapsed()
    }

    /// Whether the lease has been returned
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Return the lease. Returns `false` if it was already returned.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.manager.release(self.info.id, &self.info.device_id);
        true
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_limits_presets() {
        assert_eq!(ResourceLimits::exclusive().max_leases_per_device, Some(1));
        assert_eq!(ResourceLimits::shared(3).max_leases_per_device, Some(3));
        assert!(ResourceLimits::unlimited().max_leases_per_device.is_none());
        assert_eq!(
            ResourceLimits::default().max_leases_per_device,
            ResourceLimits::exclusive().max_leases_per_device
        );
    }

    #[test]
    fn test_exclusive_lease_blocks_second_holder() {
        let (manager, mut warnings) = ResourceManager::exclusive();

        let lease = manager.acquire("camera:0").unwrap();
        assert!(manager.is_held("camera:0"));

        let err = manager.acquire("camera:0").unwrap_err();
        assert_eq!(
            err,
            CoreError::ResourceBusy {
                resource: "camera:0".to_string(),
                holders: 1
            }
        );

        let warning = warnings.try_recv().unwrap();
        assert_eq!(warning.severity(), WarningSeverity::High);
        assert!(warning.recommended_action().contains("camera:0"));

        drop(lease);
        assert!(!manager.is_held("camera:0"));
        assert!(manager.acquire("camera:0").is_ok());
    }

    #[test]
    fn test_release_is_counted_once() {
        let (manager, _warnings) = ResourceManager::exclusive();
        let mut lease = manager.acquire("camera:0").unwrap();

        assert!(lease.release());
        assert!(!lease.release());
        drop(lease);

        let usage = manager.current_usage();
        assert_eq!(usage.active_leases, 0);
        assert_eq!(usage.total_acquired, 1);
        assert_eq!(usage.total_released, 1);
    }

    #[test]
    fn test_device_limit() {
        let (manager, mut warnings) = ResourceManager::new(ResourceLimits {
            max_leases_per_device: None,
            max_devices: Some(1),
        });

        let _first = manager.acquire("camera:0").unwrap();
        let _again = manager.acquire("camera:0").unwrap();
        assert!(manager.acquire("camera:1").is_err());
        assert!(matches!(
            warnings.try_recv().unwrap(),
            ResourceWarning::DeviceLimitReached { current: 1, limit: 1 }
        ));
        assert_eq!(manager.current_usage().rejected, 1);
    }

    #[test]
    fn test_stale_lease_check() {
        let (manager, _warnings) = ResourceManager::exclusive();
        let _lease = manager.acquire("camera:0").unwrap();

        let warnings = manager.check_stale_leases(Duration::ZERO);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity(), WarningSeverity::Low);

        assert!(manager.check_stale_leases(Duration::from_secs(3600)).is_empty());
    }
}
