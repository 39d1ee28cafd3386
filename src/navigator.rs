use serde::Serialize;
use tracing::debug;

use crate::config::FlashSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureOutcome {
    Moved { from: usize, to: usize },
    /// Not far or fast enough, or already at the end of the sequence
    SnapBack,
    /// A previous gesture's settle animation has not finished yet
    Ignored,
}

/// Index over the flash feed, moved one article per vertical drag.
///
/// Every resolved gesture starts a settle animation on the presentation
/// side; until [`SwipeNavigator::settle_finished`] is called, further
/// gestures are ignored.
#[derive(Debug, Clone)]
pub struct SwipeNavigator {
    index: usize,
    len: usize,
    threshold_fraction: f64,
    velocity_threshold: f64,
    settling: bool,
}

impl SwipeNavigator {
    pub fn new(len: usize, settings: &FlashSettings) -> Self {
        Self {
            index: 0,
            len,
            threshold_fraction: settings.threshold_fraction,
            velocity_threshold: settings.velocity_threshold,
            settling: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_settling(&self) -> bool {
        self.settling
    }

    /// Resolves a completed drag. Positive translation is a downward drag
    /// (previous article), negative an upward one (next article).
    pub fn resolve(
        &mut self,
        translation_y: f64,
        velocity_y: f64,
        viewport_height: f64,
    ) -> GestureOutcome {
        if self.settling {
            debug!("Ignoring gesture while settling");
            return GestureOutcome::Ignored;
        }
        if self.is_empty() {
            return GestureOutcome::Ignored;
        }
        self.settling = true;

        let far_enough = translation_y.abs() > viewport_height * self.threshold_fraction;
        let fast_enough = velocity_y.abs() > self.velocity_threshold;
        if !(far_enough || fast_enough) {
            return GestureOutcome::SnapBack;
        }

        let target = if translation_y > 0.0 {
            self.index.checked_sub(1)
        } else if translation_y < 0.0 {
            Some(self.index + 1).filter(|next| *next < self.len)
        } else {
            None
        };

        match target {
            Some(to) => {
                let from = self.index;
                self.index = to;
                GestureOutcome::Moved { from, to }
            }
            None => GestureOutcome::SnapBack,
        }
    }

    pub fn settle_finished(&mut self) {
        self.settling = false;
    }

    /// Follows a change in the backing sequence, keeping the index in range.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.index = self.index.min(len.saturating_sub(1));
    }

    /// "n of len" for the header, 1-based.
    pub fn position_label(&self) -> String {
        if self.is_empty() {
            return "0 of 0".to_string();
        }
        format!("{} of {}", self.index + 1, self.len)
    }

    pub fn progress(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.index + 1) as f64 / self.len as f64
    }
}

/// What the flash screen renders: the extended sequence and the current position.
#[derive(Debug, Clone, Serialize)]
pub struct FlashView<T> {
    pub items: Vec<T>,
    pub index: usize,
    pub position: String,
    pub progress: f64,
    pub settling: bool,
}

impl SwipeNavigator {
    pub fn view<T: Clone>(&self, items: Vec<T>) -> FlashView<T> {
        FlashView {
            index: self.index,
            position: self.position_label(),
            progress: self.progress(),
            settling: self.settling,
            items,
        }
    }
}

/// Repeats `items` back to back `copies` times.
pub fn extend_cyclic<T: Clone>(items: &[T], copies: usize) -> Vec<T> {
    let mut extended = Vec::with_capacity(items.len() * copies);
    for _ in 0..copies {
        extended.extend_from_slice(items);
    }
    extended
}
