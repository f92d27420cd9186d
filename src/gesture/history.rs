//! Rolling window of recent gesture labels, used for diagnostics and
//! the stability figure reported over IPC.

use std::collections::VecDeque;

use super::classifier::GestureLabel;

#[derive(Debug)]
pub struct GestureHistory {
    labels: VecDeque<GestureLabel>,
    capacity: usize,
}

impl GestureHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a label, evicting the oldest once the window is full.
    pub fn push(&mut self, label: GestureLabel) {
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
    }

    pub fn latest(&self) -> Option<GestureLabel> {
        self.labels.back().copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Fraction of the window agreeing with the most recent label.
    /// An empty window reports zero agreement.
    pub fn agreement(&self) -> f32 {
        let Some(latest) = self.latest() else {
            return 0.0;
        };
        let matching = self.labels.iter().filter(|&&l| l == latest).count();
        matching as f32 / self.labels.len() as f32
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }
}
