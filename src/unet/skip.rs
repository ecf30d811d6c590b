use crate::error::{Error, Result};
use burn::prelude::*;

/// Feature maps kept from the contracting path, consumed last-in-first-out by the expanding path.
#[derive(Debug)]
pub struct SkipStack<B: Backend> {
    maps: Vec<Tensor<B, 4>>,
    pushed: usize,
    popped: usize,
}

impl<B: Backend> Default for SkipStack<B> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<B: Backend> SkipStack<B> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            maps: Vec::with_capacity(capacity),
            pushed: 0,
            popped: 0,
        }
    }

    pub fn push(&mut self, map: Tensor<B, 4>) {
        self.pushed += 1;
        self.maps.push(map);
    }

    /// Pops the most recently pushed map. `level` is only used for error reporting.
    pub fn pop(&mut self, level: usize) -> Result<Tensor<B, 4>> {
        let map = self.maps.pop().ok_or(Error::SkipStackExhausted { level })?;
        self.popped += 1;
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn pushed(&self) -> usize {
        self.pushed
    }

    pub fn popped(&self) -> usize {
        self.popped
    }

    /// Fails unless every pushed map was popped.
    pub fn finish(self) -> Result<()> {
        if self.pushed != self.popped || !self.maps.is_empty() {
            return Err(Error::UnbalancedSkips {
                pushed: self.pushed,
                popped: self.popped,
            });
        }
        Ok(())
    }
}

/// What happened at one expanding level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipRecord {
    pub level: usize,
    pub upsampled_channels: usize,
    pub skip_channels: usize,
    pub concat_channels: usize,
    pub height: usize,
    pub width: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    fn map(channels: usize, device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        Tensor::zeros([1, channels, 2, 2], device)
    }

    #[test]
    fn pops_in_reverse_push_order() {
        let device = Default::default();
        let mut stack = SkipStack::<TestBackend>::default();
        stack.push(map(1, &device));
        stack.push(map(2, &device));
        stack.push(map(3, &device));

        let order: Vec<usize> = (0..3)
            .map(|level| stack.pop(level).unwrap().dims()[1])
            .collect();
        assert_eq!(vec![3, 2, 1], order);
        assert_eq!((3, 3), (stack.pushed(), stack.popped()));
        stack.finish().unwrap();
    }

    #[test]
    fn leftover_maps_are_unbalanced() {
        let device = Default::default();
        let mut stack = SkipStack::<TestBackend>::with_capacity(2);
        stack.push(map(1, &device));
        stack.push(map(1, &device));
        stack.pop(1).unwrap();

        match stack.finish() {
            Err(Error::UnbalancedSkips { pushed, popped }) => assert_eq!((2, 1), (pushed, popped)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn popping_an_empty_stack_fails() {
        let mut stack = SkipStack::<TestBackend>::default();
        assert!(matches!(
            stack.pop(4),
            Err(Error::SkipStackExhausted { level: 4 })
        ));
    }
}
