/// Default prefetch hint handed to consumers of the inbound stream.
pub const DEFAULT_PREFETCH: u64 = u64::MAX;

/// Default size of the read buffer used by stream transports.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Per-channel settings.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Backpressure sizing hint. Carried through, never enforced here.
    pub prefetch: u64,
    pub io_dispatcher_name: String,
    pub events_dispatcher_name: String,
    pub read_buffer_size: usize,
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self {
            prefetch: DEFAULT_PREFETCH,
            io_dispatcher_name: "xchannel-io".into(),
            events_dispatcher_name: "xchannel-events".into(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_prefetch(mut self, prefetch: u64) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_io_dispatcher_name(mut self, name: impl Into<String>) -> Self {
        self.io_dispatcher_name = name.into();
        self
    }

    pub fn with_events_dispatcher_name(mut self, name: impl Into<String>) -> Self {
        self.events_dispatcher_name = name.into();
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.prefetch, DEFAULT_PREFETCH);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.io_dispatcher_name, "xchannel-io");
    }

    #[test]
    fn test_read_buffer_never_zero() {
        let config = ChannelConfig::new().with_read_buffer_size(0).with_prefetch(32);
        assert_eq!(config.read_buffer_size, 1);
        assert_eq!(config.prefetch, 32);
    }
}
