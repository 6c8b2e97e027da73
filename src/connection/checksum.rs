/// IPMB two's-complement checksum accumulator.
///
/// The checksum of a span is the negation of the 8-bit wrapping sum of its
/// bytes, optionally continued from an earlier accumulator value.
pub struct Checksum {
    state: u8,
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

impl Checksum {
    /// A checksum starting from a zero accumulator.
    pub fn new() -> Self {
        Self { state: 0 }
    }

    /// A checksum continuing from the accumulator value `start`.
    pub fn with_start(start: u8) -> Self {
        Self { state: start }
    }

    /// Checksum a byte span in one step.
    pub fn of(data: &[u8]) -> u8 {
        let mut me = Self::new();
        me.feed_all(data);
        me.finalize()
    }

    /// Accumulate a single byte.
    pub fn feed(&mut self, data: u8) {
        self.state = self.state.wrapping_add(data);
    }

    /// Accumulate a span of bytes.
    pub fn feed_all(&mut self, data: &[u8]) {
        data.iter().for_each(|v| self.feed(*v));
    }

    /// The negated sum over everything fed so far.
    pub fn finalize(&self) -> u8 {
        (!self.state).wrapping_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::Checksum;

    #[test]
    fn ipmb_header_checksum() {
        assert_eq!(0xC8, Checksum::of(&[0x20, 0x06 << 2]));
    }

    #[test]
    fn checksum_closes_a_frame() {
        let frame = [0x20u8, 0x1D, 0xC3, 0x22, 0x40, 0x01, 0x00];
        let csum = Checksum::of(&frame);

        let mut verify = Checksum::new();
        verify.feed_all(&frame);
        verify.feed(csum);
        // A frame followed by its own checksum sums to zero.
        assert_eq!(verify.finalize(), 0);
    }

    #[test]
    fn starting_accumulator_continues_a_sum() {
        let mut split = Checksum::with_start(0x20);
        split.feed_all(&[0x06 << 2]);

        assert_eq!(split.finalize(), Checksum::of(&[0x20, 0x06 << 2]));
    }
}
