//! Step cursor and progress computation.

use serde::Serialize;

use crate::graph::Question;

/// Position within the visible sequence, or the terminal screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepCursor {
    pub index: usize,
    pub terminal: bool,
}

impl StepCursor {
    pub fn at(index: usize) -> Self {
        Self {
            index,
            terminal: false,
        }
    }

    /// Index clamped into a sequence of `len` questions.
    pub fn clamped(&self, len: usize) -> usize {
        self.index.min(len.saturating_sub(1))
    }
}

/// Human progress through the visible, non-terminal questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub step: usize,
    pub total: usize,
    pub complete: bool,
}

impl Progress {
    /// Recompute against the current visible sequence.
    ///
    /// The denominator counts visible non-terminal questions, so it moves
    /// whenever a gate opens or closes.
    pub fn compute(visible: &[&Question], cursor: &StepCursor) -> Self {
        let total = visible.iter().filter(|q| !q.kind.is_terminal()).count();
        if cursor.terminal {
            return Self {
                step: total,
                total,
                complete: true,
            };
        }

        let index = cursor.clamped(visible.len());
        let step = visible
            .iter()
            .take(index + 1)
            .filter(|q| !q.kind.is_terminal())
            .count()
            .max(1)
            .min(total.max(1));

        Self {
            step,
            total,
            complete: false,
        }
    }

    /// Percentage in `0.0..=100.0`.
    pub fn percent(&self) -> f64 {
        if self.complete {
            return 100.0;
        }
        if self.total == 0 {
            return 0.0;
        }
        (self.step as f64 / self.total as f64 * 100.0).min(100.0)
    }

    pub fn label(&self) -> String {
        if self.complete {
            "Complete!".to_string()
        } else {
            format!("{} of {}", self.step, self.total)
        }
    }
}
