//! Render layer membership
//!
//! Objects belong to any of 32 layers. A camera renders an object only when
//! the two share at least one layer.

/// 32-channel layer bitmask; new objects are on layer 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layers {
    /// Raw membership bits
    pub mask: u32,
}

impl Default for Layers {
    fn default() -> Self {
        Self { mask: 1 }
    }
}

impl Layers {
    /// Membership in layer 0 only
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `channel` the only layer
    pub fn set(&mut self, channel: u32) {
        self.mask = Self::bit(channel);
    }

    /// Add `channel`
    pub fn enable(&mut self, channel: u32) {
        self.mask |= Self::bit(channel);
    }

    /// Join every layer
    pub fn enable_all(&mut self) {
        self.mask = u32::MAX;
    }

    /// Flip `channel`
    pub fn toggle(&mut self, channel: u32) {
        self.mask ^= Self::bit(channel);
    }

    /// Leave `channel`
    pub fn disable(&mut self, channel: u32) {
        self.mask &= !Self::bit(channel);
    }

    /// Leave every layer
    pub fn disable_all(&mut self) {
        self.mask = 0;
    }

    /// True when `self` and `other` share a layer
    pub fn test(&self, other: &Layers) -> bool {
        self.mask & other.mask != 0
    }

    /// True when `channel` is enabled
    pub fn is_enabled(&self, channel: u32) -> bool {
        self.mask & Self::bit(channel) != 0
    }

    fn bit(channel: u32) -> u32 {
        // Channels beyond 31 wrap, matching a 32-bit shift
        1u32 << (channel % 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layer_zero() {
        let layers = Layers::new();
        assert!(layers.is_enabled(0));
        assert!(!layers.is_enabled(1));
    }

    #[test]
    fn test_set_enable_toggle_disable() {
        let mut object = Layers::new();
        let mut camera = Layers::new();
        camera.set(2);
        assert!(!object.test(&camera));

        object.enable(2);
        assert!(object.test(&camera));

        object.toggle(2);
        assert!(!object.test(&camera));

        object.enable_all();
        object.disable(2);
        assert!(!object.test(&camera));
        assert!(object.is_enabled(5));
    }
}
