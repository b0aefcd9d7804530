//! Explicit frame scheduling.
//!
//! The render loop never reschedules itself implicitly: every frame is
//! requested through a [`FrameScheduler`] and identified by the returned
//! [`FrameToken`], so pausing is a plain `cancel`.

/// Handle for one requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

impl FrameToken {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Source of display-synchronized frame callbacks.
pub trait FrameScheduler {
    /// Request one frame. The host later delivers it with the returned token.
    fn schedule(&mut self) -> FrameToken;

    /// Withdraw a requested frame. Unknown or already delivered tokens are
    /// ignored.
    fn cancel(&mut self, token: FrameToken);
}

/// Frame requests queued for an outer loop to deliver, such as a window's
/// redraw cycle or a test driver.
#[derive(Debug, Default)]
pub struct QueuedFrames {
    next: u64,
    pending: Vec<FrameToken>,
    scheduled: u64,
    cancelled: u64,
}

impl QueuedFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested frames not yet delivered, oldest first.
    pub fn pending(&self) -> &[FrameToken] {
        &self.pending
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return the oldest requested frame.
    pub fn pop(&mut self) -> Option<FrameToken> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    /// Total number of `schedule` calls.
    pub fn scheduled(&self) -> u64 {
        self.scheduled
    }

    /// Number of `cancel` calls that withdrew a pending frame.
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for QueuedFrames {
    fn schedule(&mut self) -> FrameToken {
        self.next += 1;
        self.scheduled += 1;
        let token = FrameToken(self.next);
        self.pending.push(token);
        token
    }

    fn cancel(&mut self, token: FrameToken) {
        let before = self.pending.len();
        self.pending.retain(|t| *t != token);
        if self.pending.len() < before {
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique_and_ordered() {
        let mut frames = QueuedFrames::new();
        let a = frames.schedule();
        let b = frames.schedule();
        assert_ne!(a, b);
        assert_eq!(frames.pop(), Some(a));
        assert_eq!(frames.pop(), Some(b));
        assert_eq!(frames.pop(), None);
    }

    #[test]
    fn test_cancel_withdraws_only_pending_frames() {
        let mut frames = QueuedFrames::new();
        let a = frames.schedule();
        frames.cancel(a);
        assert!(frames.is_idle());
        assert_eq!(frames.cancelled(), 1);

        frames.cancel(a);
        frames.cancel(FrameToken::from_raw(99));
        assert_eq!(frames.cancelled(), 1, "stale tokens are ignored");
        assert_eq!(frames.scheduled(), 1);
    }
}
