//! Per-connection sequence number allocation.

/// Largest sequence number; the next allocation after it is 1.
pub const MAX_SEQUENCE: u32 = 0x7FFF_FFFF;

/// Wrapping 31-bit counter. 0 is never handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceCounter {
    current: u32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter whose last allocation was `current`
    pub fn starting_at(current: u32) -> Self {
        Self {
            current: current.min(MAX_SEQUENCE),
        }
    }

    /// Last allocated value, 0 if nothing was allocated since the last reset
    pub fn current(&self) -> u32 {
        self.current
    }

    /// The value [`next`](Self::next) would return, without allocating it
    pub fn peek_next(&self) -> u32 {
        if self.current >= MAX_SEQUENCE {
            1
        } else {
            self.current + 1
        }
    }

    pub fn next(&mut self) -> u32 {
        self.current = self.peek_next();
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_one() {
        let mut seq = SequenceCounter::new();
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn test_wraps_to_one_after_max() {
        let mut seq = SequenceCounter::starting_at(MAX_SEQUENCE - 1);
        assert_eq!(seq.next(), MAX_SEQUENCE);
        assert_eq!(seq.next(), 1);
    }

    #[test]
    fn test_peek_does_not_allocate() {
        let seq = SequenceCounter::starting_at(41);
        assert_eq!(seq.peek_next(), 42);
        assert_eq!(seq.current(), 41);
    }

    #[test]
    fn test_reset() {
        let mut seq = SequenceCounter::starting_at(99);
        seq.reset();
        assert_eq!(seq.next(), 1);
    }
}
