//! Switchable capabilities for exercising radio precondition failures

use bluemsg_core::Capabilities;
use std::sync::atomic::{AtomicBool, Ordering};

/// Capabilities whose answers tests can flip at any time
#[derive(Debug)]
pub struct SimCapabilities {
    supported: AtomicBool,
    permitted: AtomicBool,
    enabled: AtomicBool,
}

impl Default for SimCapabilities {
    fn default() -> Self {
        Self {
            supported: AtomicBool::new(true),
            permitted: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
        }
    }
}

impl SimCapabilities {
    /// Every check passes
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_supported(&self, supported: bool) {
        self.supported.store(supported, Ordering::SeqCst);
    }

    pub fn set_permitted(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::SeqCst);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Capabilities for SimCapabilities {
    async fn is_radio_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    async fn has_required_permissions(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    async fn is_radio_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluemsg_core::RadioReadiness;

    #[tokio::test]
    async fn test_most_severe_failure_reported() {
        let caps = SimCapabilities::new();
        assert_eq!(RadioReadiness::check(&caps).await, RadioReadiness::Ready);

        caps.set_enabled(false);
        assert_eq!(RadioReadiness::check(&caps).await, RadioReadiness::Disabled);

        caps.set_permitted(false);
        assert_eq!(RadioReadiness::check(&caps).await, RadioReadiness::PermissionDenied);

        caps.set_supported(false);
        assert_eq!(RadioReadiness::check(&caps).await, RadioReadiness::Unsupported);
    }
}
