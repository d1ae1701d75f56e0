use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::gate::GateConfig;

/// Publishes immutable [`GateConfig`] snapshots.
///
/// Readers take an `Arc` and keep it for as long as they need a consistent
/// view; `publish` swaps the whole snapshot and never edits one in place.
/// Reads are lock-free.
#[derive(Debug)]
pub struct ConfigHandle {
    current: ArcSwap<GateConfig>,
}

impl ConfigHandle {
    pub fn new(config: GateConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    /// The snapshot in effect right now.
    pub fn current(&self) -> Arc<GateConfig> {
        self.current.load_full()
    }

    /// Replace the snapshot. Connections already holding the old one keep it.
    pub fn publish(&self, config: GateConfig) -> Arc<GateConfig> {
        let next = Arc::new(config);
        self.current.store(Arc::clone(&next));
        tracing::info!(server_name = %next.server_name, "Published new gate configuration snapshot");
        next
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Old snapshots stay intact after a publish
    #[test]
    fn test_publish_keeps_old_snapshot() {
        let handle = ConfigHandle::default();
        let before = handle.current();

        let next = GateConfig {
            proxy_min_ssf: 128,
            ..GateConfig::default()
        };
        handle.publish(next);

        assert_eq!(before.proxy_min_ssf, 0);
        assert_eq!(handle.current().proxy_min_ssf, 128);
    }

    /// Snapshots can be read from many threads at once
    #[test]
    fn test_concurrent_readers() {
        let handle = Arc::new(ConfigHandle::default());
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                std::thread::spawn(move || handle.current().max_login_length)
            })
            .collect();
        for reader in readers {
            assert_eq!(reader.join().unwrap(), 255);
        }
    }
}
