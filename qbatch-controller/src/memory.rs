//! Host and accelerator memory probing
//!
//! All ranks must agree on the capacity of the smallest machine, so both
//! probes reduce their local value with MIN across the fabric before
//! returning it.

use crate::fabric::Fabric;
use std::sync::Once;

/// An accelerator device visible to this process
pub trait Accelerator: Send + Sync {
    /// Ordinal of the device on this machine
    fn device_id(&self) -> usize;

    /// Total onboard memory in MiB
    fn total_memory_mb(&self) -> u64;

    /// Enable peer access toward `other`; failures are ignored
    fn enable_peer_access(&self, other: &dyn Accelerator) -> bool {
        let _ = other;
        false
    }
}

/// Probe for host and device physical memory
pub struct MemoryProbe {
    accelerators: Vec<Box<dyn Accelerator>>,
    peer_init: Once,
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe {
    /// Create a probe that sees no accelerator devices
    pub fn new() -> Self {
        Self {
            accelerators: Vec::new(),
            peer_init: Once::new(),
        }
    }

    /// Create a probe over the given accelerator devices
    pub fn with_accelerators(accelerators: Vec<Box<dyn Accelerator>>) -> Self {
        Self {
            accelerators,
            peer_init: Once::new(),
        }
    }

    /// Physical host memory in MiB, reduced with MIN across all ranks
    pub fn host_memory_mb(&self, fabric: &dyn Fabric) -> u64 {
        self.ensure_peer_access();
        fabric.allreduce_min(host_physical_memory_bytes() >> 20)
    }

    /// Total accelerator memory in MiB, reduced with MIN across all ranks
    ///
    /// Zero when no device is visible.
    pub fn device_memory_mb(&self, fabric: &dyn Fabric) -> u64 {
        self.ensure_peer_access();
        let local: u64 = self
            .accelerators
            .iter()
            .map(|device| device.total_memory_mb())
            .sum();
        fabric.allreduce_min(local)
    }

    // Peer access is attempted once, between every ordered pair of distinct
    // devices. Failures are ignored.
    fn ensure_peer_access(&self) {
        self.peer_init.call_once(|| {
            for a in &self.accelerators {
                for b in &self.accelerators {
                    if a.device_id() != b.device_id() {
                        let _ = a.enable_peer_access(b.as_ref());
                    }
                }
            }
        });
    }
}

/// Page-count times page-size of the current machine
#[cfg(unix)]
fn host_physical_memory_bytes() -> u64 {
    let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) };
    if pages <= 0 || page_size <= 0 {
        0
    } else {
        pages as u64 * page_size as u64
    }
}

#[cfg(not(unix))]
fn host_physical_memory_bytes() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::{SoloFabric, StaticFabric};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeDevice {
        id: usize,
        memory_mb: u64,
        peer_calls: Arc<AtomicUsize>,
    }

    impl Accelerator for FakeDevice {
        fn device_id(&self) -> usize {
            self.id
        }

        fn total_memory_mb(&self) -> u64 {
            self.memory_mb
        }

        fn enable_peer_access(&self, _other: &dyn Accelerator) -> bool {
            self.peer_calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_host_memory_positive() {
        let probe = MemoryProbe::new();
        assert!(probe.host_memory_mb(&SoloFabric) > 0);
    }

    #[test]
    fn test_no_devices_reports_zero() {
        let probe = MemoryProbe::new();
        assert_eq!(probe.device_memory_mb(&SoloFabric), 0);
    }

    #[test]
    fn test_device_memory_sums() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = MemoryProbe::with_accelerators(vec![
            Box::new(FakeDevice {
                id: 0,
                memory_mb: 8192,
                peer_calls: calls.clone(),
            }),
            Box::new(FakeDevice {
                id: 1,
                memory_mb: 4096,
                peer_calls: calls.clone(),
            }),
        ]);
        assert_eq!(probe.device_memory_mb(&StaticFabric::new(0, 2)), 12288);
    }

    #[test]
    fn test_peer_access_enabled_once_per_ordered_pair() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = MemoryProbe::with_accelerators(vec![
            Box::new(FakeDevice {
                id: 0,
                memory_mb: 1,
                peer_calls: calls.clone(),
            }),
            Box::new(FakeDevice {
                id: 1,
                memory_mb: 1,
                peer_calls: calls.clone(),
            }),
        ]);
        probe.device_memory_mb(&SoloFabric);
        probe.device_memory_mb(&SoloFabric);
        probe.host_memory_mb(&SoloFabric);
        // Two ordered pairs, attempted exactly once
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
