use gpui::{Pixels, Point, point, px};
use gpui_component::VirtualListScrollHandle;

/// Distance from the tail within which follow mode re-engages.
const FOLLOW_RESUME_THRESHOLD: Pixels = px(24.);
/// Offset deltas below this are treated as layout jitter, not user intent.
const JITTER_EPSILON: f32 = 1.0;

/// Keeps the feed pinned to the newest entry.
///
/// Following pauses when the user scrolls up into history and resumes when
/// they return near the tail; a submission forces a jump regardless.
pub struct FollowScroll {
    handle: VirtualListScrollHandle,
    pending_jump: bool,
    following: bool,
    previous_offset: Pixels,
    previous_max_offset: Pixels,
}

impl FollowScroll {
    pub fn new() -> Self {
        Self {
            handle: VirtualListScrollHandle::new(),
            pending_jump: false,
            following: true,
            previous_offset: Pixels::ZERO,
            previous_max_offset: Pixels::ZERO,
        }
    }

    pub fn handle(&self) -> &VirtualListScrollHandle {
        &self.handle
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Forces a jump to the newest entry on the next frame.
    pub fn jump_to_latest(&mut self) {
        self.pending_jump = true;
        self.following = true;
    }

    /// Requests a jump only if the user is already watching the tail.
    pub fn follow_if_at_tail(&mut self) {
        if self.following || self.previously_near_tail() {
            self.pending_jump = true;
        }
    }

    pub fn reset(&mut self) {
        self.previous_offset = Pixels::ZERO;
        self.previous_max_offset = Pixels::ZERO;
        self.following = true;
        self.pending_jump = true;
    }

    /// Reads the scroll position once per frame and updates follow state
    /// from what the user did since the previous frame.
    pub fn observe_frame(&mut self) {
        let offset = self.handle.offset().y;
        let max_offset = self.handle.max_offset().height;

        let offset_delta = f32::from(offset) - f32::from(self.previous_offset);
        let content_grew =
            (f32::from(max_offset) - f32::from(self.previous_max_offset)).abs() > JITTER_EPSILON;
        let scrolled_up = offset_delta > JITTER_EPSILON && !content_grew;
        let scrolled_down = offset_delta < -JITTER_EPSILON && !content_grew;

        if self.pending_jump || (content_grew && self.previously_near_tail()) {
            self.following = true;
        } else if self.following {
            if scrolled_up {
                self.following = false;
            }
        } else if scrolled_down && self.currently_near_tail() {
            self.following = true;
        }

        self.previous_offset = offset;
        self.previous_max_offset = max_offset;
    }

    /// Applies any requested jump. Returns true when the offset moved.
    pub fn apply_pending_jump(&mut self) -> bool {
        let should_jump = self.following || self.pending_jump;

        if should_jump {
            let max_offset = self.handle.max_offset().height;
            let current_x = self.handle.offset().x;
            let target_y = if max_offset > Pixels::ZERO {
                -max_offset
            } else {
                Pixels::ZERO
            };
            self.handle.set_offset(point(current_x, target_y));
        }

        self.pending_jump = false;
        should_jump
    }

    pub fn bounds_width(&self) -> Pixels {
        self.handle.bounds().size.width
    }

    pub fn offset(&self) -> Point<Pixels> {
        self.handle.offset()
    }

    fn currently_near_tail(&self) -> bool {
        near_tail(self.handle.offset().y, self.handle.max_offset().height)
    }

    fn previously_near_tail(&self) -> bool {
        near_tail(self.previous_offset, self.previous_max_offset)
    }
}

impl Default for FollowScroll {
    fn default() -> Self {
        Self::new()
    }
}

/// GPUI scrolls with negative Y offsets, so `offset + max` approaches zero
/// at the tail.
fn near_tail(offset: Pixels, max_offset: Pixels) -> bool {
    if max_offset <= Pixels::ZERO {
        return true;
    }

    (offset + max_offset).abs() <= FOLLOW_RESUME_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_counts_as_tail() {
        assert!(near_tail(Pixels::ZERO, Pixels::ZERO));
        assert!(near_tail(px(-10.), px(0.)));
    }

    #[test]
    fn tail_detection_uses_the_resume_threshold() {
        // Scrolled fully to the tail: offset == -max.
        assert!(near_tail(px(-500.), px(500.)));
        // Within the threshold above the tail.
        assert!(near_tail(px(-480.), px(500.)));
        // Beyond the threshold counts as reading history.
        assert!(!near_tail(px(-400.), px(500.)));
    }
}
