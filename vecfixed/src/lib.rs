use std::collections::VecDeque;
use std::fmt::Display;

use serde::ser::{Serialize, SerializeSeq, Serializer};

/// A vector that never holds more than `N` elements. Once full, every push
/// drops the oldest element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecFixed<const N: usize, T> {
    buffer: VecDeque<T>,
}

impl<const N: usize, T> Default for VecFixed<N, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, T> VecFixed<N, T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(N),
        }
    }

    pub fn push(&mut self, element: T) {
        if N == 0 {
            return;
        }

        if self.buffer.len() == N {
            self.buffer.pop_front();
        }

        self.buffer.push_back(element);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Most recently pushed element.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.buffer.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl<const N: usize, T: Display> VecFixed<N, T> {
    /// Join the elements, oldest first, into a string.
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        let mut s = String::new();

        for (i, element) in self.buffer.iter().enumerate() {
            if i > 0 {
                s.push_str(separator);
            }
            s.push_str(&element.to_string());
        }

        s
    }
}

impl<const N: usize, T: Serialize> Serialize for VecFixed<N, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.buffer.len()))?;
        for element in &self.buffer {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

impl<'a, const N: usize, T> IntoIterator for &'a VecFixed<N, T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.buffer.iter()
    }
}
