//! Frame request coalescing.
//!
//! Data ticks, resizes and atlas loads all ask for a frame. At most one
//! request is outstanding: a new request supersedes the pending one, and
//! teardown cancels it.

/// Identifies one requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(u64);

#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: Option<FrameHandle>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a frame, discarding any pending request.
    pub fn request(&mut self) -> FrameHandle {
        if let Some(stale) = self.pending.take() {
            tracing::trace!("Superseding frame {:?}", stale);
        }
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending = Some(handle);
        handle
    }

    /// Cancel `handle` if it is still pending.
    pub fn cancel(&mut self, handle: FrameHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Run `handle`: true if it is the pending frame, which is consumed.
    pub fn fire(&mut self, handle: FrameHandle) -> bool {
        self.cancel(handle)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_supersedes_pending() {
        let mut scheduler = FrameScheduler::new();
        let first = scheduler.request();
        let second = scheduler.request();
        assert_ne!(first, second);
        assert!(!scheduler.fire(first));
        assert!(scheduler.fire(second));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_cancel_discards_frame() {
        let mut scheduler = FrameScheduler::new();
        let handle = scheduler.request();
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.fire(handle));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_fired_frame_runs_once() {
        let mut scheduler = FrameScheduler::new();
        scheduler.request();
        let latest = scheduler.request();
        assert!(scheduler.fire(latest));
        assert!(!scheduler.fire(latest));
    }
}
