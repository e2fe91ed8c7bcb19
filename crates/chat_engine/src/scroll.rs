/// Distance from the content end, in pixels, within which the viewport
/// counts as "at the bottom" and merges auto-scroll instead of badging.
pub const NEAR_BOTTOM_THRESHOLD_PX: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    pub offset: f32,
    pub content_height: f32,
    pub viewport_height: f32,
}

impl ScrollState {
    pub fn is_near_bottom(&self) -> bool {
        self.content_height - self.offset - self.viewport_height < NEAR_BOTTOM_THRESHOLD_PX
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDecision {
    /// Viewport was near the bottom when the log grew: scroll to the end.
    ScrollToEnd,
    /// Viewport was scrolled up: show the floating badge with this count.
    Badge(u32),
}

/// Tracks viewport position and owns the unseen-message counter. The
/// counter only ever resets through [`ScrollTracker::reset`], which the
/// session invokes for the three sanctioned paths: explicit
/// scroll-to-bottom, manual refresh, and sending a message.
pub struct ScrollTracker {
    near_bottom: bool,
    new_message_count: u32,
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollTracker {
    /// A freshly mounted chat screen opens pinned to the bottom.
    pub fn new() -> Self {
        Self {
            near_bottom: true,
            new_message_count: 0,
        }
    }

    pub fn on_scroll(&mut self, state: ScrollState) {
        self.near_bottom = state.is_near_bottom();
    }

    pub fn on_merge(&mut self, added: usize) -> Option<ScrollDecision> {
        if added == 0 {
            return None;
        }
        if self.near_bottom {
            Some(ScrollDecision::ScrollToEnd)
        } else {
            self.new_message_count += added as u32;
            Some(ScrollDecision::Badge(self.new_message_count))
        }
    }

    pub fn reset(&mut self) {
        self.near_bottom = true;
        self.new_message_count = 0;
    }

    pub fn new_message_count(&self) -> u32 {
        self.new_message_count
    }

    pub fn is_near_bottom(&self) -> bool {
        self.near_bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrolled_up() -> ScrollState {
        ScrollState {
            offset: 0.0,
            content_height: 2000.0,
            viewport_height: 600.0,
        }
    }

    fn at_bottom() -> ScrollState {
        ScrollState {
            offset: 1400.0,
            content_height: 2000.0,
            viewport_height: 600.0,
        }
    }

    #[test]
    fn threshold_is_a_strict_hundred_pixels() {
        let just_inside = ScrollState {
            offset: 1300.1,
            content_height: 2000.0,
            viewport_height: 600.0,
        };
        let just_outside = ScrollState {
            offset: 1300.0,
            content_height: 2000.0,
            viewport_height: 600.0,
        };
        assert!(just_inside.is_near_bottom());
        assert!(!just_outside.is_near_bottom());
    }

    #[test]
    fn near_bottom_merge_scrolls_to_end() {
        let mut tracker = ScrollTracker::new();
        tracker.on_scroll(at_bottom());
        assert_eq!(tracker.on_merge(3), Some(ScrollDecision::ScrollToEnd));
        assert_eq!(tracker.new_message_count(), 0);
    }

    #[test]
    fn scrolled_up_merge_accumulates_badge() {
        let mut tracker = ScrollTracker::new();
        tracker.on_scroll(scrolled_up());
        assert_eq!(tracker.on_merge(2), Some(ScrollDecision::Badge(2)));
        assert_eq!(tracker.on_merge(1), Some(ScrollDecision::Badge(3)));
        assert_eq!(tracker.new_message_count(), 3);
    }

    #[test]
    fn empty_merge_decides_nothing() {
        let mut tracker = ScrollTracker::new();
        tracker.on_scroll(scrolled_up());
        assert_eq!(tracker.on_merge(0), None);
        assert_eq!(tracker.new_message_count(), 0);
    }

    #[test]
    fn scrolling_back_down_does_not_clear_the_badge() {
        let mut tracker = ScrollTracker::new();
        tracker.on_scroll(scrolled_up());
        tracker.on_merge(2);
        tracker.on_scroll(at_bottom());
        assert_eq!(tracker.new_message_count(), 2);
    }

    #[test]
    fn reset_clears_count_and_pins_to_bottom() {
        let mut tracker = ScrollTracker::new();
        tracker.on_scroll(scrolled_up());
        tracker.on_merge(5);
        tracker.reset();
        assert_eq!(tracker.new_message_count(), 0);
        assert!(tracker.is_near_bottom());
    }
}
