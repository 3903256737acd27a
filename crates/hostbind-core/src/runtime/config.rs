//! Runtime configuration.

/// Configuration for a [`HostRuntime`](crate::HostRuntime).
///
/// ```rust
/// use hostbind_core::{HostRuntime, RuntimeConfig};
///
/// let rt = HostRuntime::with_config(RuntimeConfig::default().leak_warnings(false));
/// assert!(!rt.config().leak_warnings);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Log a warning for every instance still alive when the runtime drops.
    pub leak_warnings: bool,
    /// Destruct owned, ready instances still alive when the runtime drops.
    /// When off, their payloads are leaked. Either way, keep-alive
    /// callbacks attached to those instances are dropped without running.
    pub strict_teardown: bool,
}

impl RuntimeConfig {
    pub fn leak_warnings(mut self, enabled: bool) -> Self {
        self.leak_warnings = enabled;
        self
    }

    pub fn strict_teardown(mut self, enabled: bool) -> Self {
        self.strict_teardown = enabled;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            leak_warnings: true,
            strict_teardown: true,
        }
    }
}
