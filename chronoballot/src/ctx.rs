use crate::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation and deadline handle threaded through every operation that
/// suspends at an I/O boundary or runs long (log fetches, posts, VDF
/// creation). Cloning shares the cancellation flag, so a front-end can hold
/// one clone and cancel a running operation from another thread. No partial
/// state is persisted once a cancelled operation returns.
#[derive(Clone)]
pub struct Ctx {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Ctx {
    pub fn background() -> Self {
        Ctx {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Ctx {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Ctx::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_propagates_to_clones() {
        let ctx = Ctx::background();
        let clone = ctx.clone();
        assert!(clone.check().is_ok());
        ctx.cancel();
        assert!(matches!(clone.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn deadline_expires() {
        let ctx = Ctx::with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(ctx.check(), Err(Error::DeadlineExceeded)));
    }
}
