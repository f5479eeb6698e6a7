use crate::vk_types::EngineError;

/// Fixed-capacity ring of per-frame resources with a cursor on the slot being recorded.
#[derive(Debug)]
pub struct FrameRing<T> {
    slots: Vec<T>,
    current: usize,
}

impl<T> FrameRing<T> {
    pub fn new(slots: Vec<T>) -> Result<Self, EngineError> {
        if slots.is_empty() {
            return Err(EngineError::EmptyFrameRing);
        }
        Ok(FrameRing { slots, current: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot)
    }

    /// Moves the cursor to the next slot and returns it.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.slots.len();
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            FrameRing::<u8>::new(Vec::new()),
            Err(EngineError::EmptyFrameRing)
        ));
    }

    #[test]
    fn advance_wraps() {
        let mut ring = FrameRing::new(vec!['a', 'b', 'c']).unwrap();
        assert_eq!(ring.current_slot(), 0);
        assert_eq!(ring.advance(), 1);
        assert_eq!(ring.advance(), 2);
        assert_eq!(ring.advance(), 0);
        assert_eq!(*ring.current(), 'a');
        assert_eq!(ring.capacity(), 3);
    }

    #[test]
    fn single_slot_stays_put() {
        let mut ring = FrameRing::new(vec![()]).unwrap();
        for _ in 0..5 {
            assert_eq!(ring.advance(), 0);
        }
    }

    #[test]
    fn get_is_bounded() {
        let ring = FrameRing::new(vec![10, 20]).unwrap();
        assert_eq!(ring.get(1), Some(&20));
        assert_eq!(ring.get(2), None);
        assert_eq!(ring.get(0), Some(&10));
    }
}
