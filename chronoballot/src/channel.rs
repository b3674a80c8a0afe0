use crate::*;
use std::sync::{Arc, Mutex};

/// 32-byte election identifier, the domain separator for every signature in
/// one election. Derived from the broadcast-channel identity.
pub type ElectionId = [u8; 32];

/// The append-only public log that is the protocol's only transport.
///
/// Order is not relied on for correctness (every validity predicate is
/// set-like), but all committed messages must be delivered before the end of
/// the Tally phase for the tally to be well-defined. Posts are idempotent at
/// the protocol layer: duplicates collapse by serial number or public-key
/// hash during verification.
pub trait BroadcastChannel {
    fn id(&self) -> ElectionId;
    fn params(&self, ctx: &Ctx) -> Result<ElectionParams>;
    fn get(&self, ctx: &Ctx) -> Result<Vec<Message>>;
    fn post(&self, ctx: &Ctx, m: Message) -> Result<()>;
}

/// In-memory broadcast channel. Clones share the same log.
#[derive(Clone)]
pub struct MockBroadcastChannel {
    inner: Arc<MockInner>,
}

struct MockInner {
    id: ElectionId,
    params: ElectionParams,
    messages: Mutex<Vec<Message>>,
}

impl MockBroadcastChannel {
    pub fn new(id: ElectionId, params: ElectionParams) -> Self {
        MockBroadcastChannel {
            inner: Arc::new(MockInner {
                id,
                params,
                messages: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Test hook: rewrite the log order in place.
    pub fn shuffle_messages(&self, f: impl FnOnce(&mut Vec<Message>)) {
        let mut messages = self.inner.messages.lock().unwrap();
        f(&mut messages);
    }
}

impl BroadcastChannel for MockBroadcastChannel {
    fn id(&self) -> ElectionId {
        self.inner.id
    }

    fn params(&self, ctx: &Ctx) -> Result<ElectionParams> {
        ctx.check()?;
        Ok(self.inner.params.clone())
    }

    fn get(&self, ctx: &Ctx) -> Result<Vec<Message>> {
        ctx.check()?;
        Ok(self.inner.messages.lock().unwrap().clone())
    }

    fn post(&self, ctx: &Ctx, m: Message) -> Result<()> {
        ctx.check()?;
        self.inner.messages.lock().unwrap().push(m);
        Ok(())
    }
}
