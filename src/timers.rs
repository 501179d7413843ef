use rustc_hash::FxHashMap;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Safety,
    RenderDebounce,
    BusyFallback,
    LayerRetry,
    Stuck,
}

/// Posted back to the event loop when a timer expires. `seq` is the recolor
/// sequence the timer was armed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub token: u64,
    pub seq: u64,
}

struct Slot {
    token: u64,
    seq: u64,
    handle: JoinHandle<()>,
}

/// One slot per [`TimerKind`]. Arming a slot aborts whatever it held, and a
/// firing whose token no longer matches its slot is stale.
pub struct Timers<E> {
    slots: FxHashMap<TimerKind, Slot>,
    next_token: u64,
    tx: UnboundedSender<E>,
}

impl<E> Timers<E>
where
    E: From<TimerFired> + Send + 'static,
{
    pub fn new(tx: UnboundedSender<E>) -> Self {
        Timers {
            slots: FxHashMap::default(),
            next_token: 0,
            tx,
        }
    }

    pub fn schedule(&mut self, kind: TimerKind, deadline: Instant, seq: u64) {
        self.cancel(kind);
        self.next_token += 1;
        let fired = TimerFired {
            kind,
            token: self.next_token,
            seq,
        };
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // The loop may already be gone during teardown.
            let _ = tx.send(fired.into());
        });
        self.slots.insert(
            kind,
            Slot {
                token: fired.token,
                seq,
                handle,
            },
        );
    }

    /// Claims a firing. Returns the sequence it was armed for, or `None` if the
    /// slot has since been re-armed or cancelled.
    pub fn take(&mut self, fired: TimerFired) -> Option<u64> {
        match self.slots.get(&fired.kind) {
            Some(slot) if slot.token == fired.token => {
                self.slots.remove(&fired.kind).map(|slot| slot.seq)
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(slot) = self.slots.remove(&kind) {
            slot.handle.abort();
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn cancel_all(&mut self) {
        for (_, slot) in self.slots.drain() {
            slot.handle.abort();
        }
    }
}

impl<E> Drop for Timers<E> {
    fn drop(&mut self) {
        for (_, slot) in self.slots.drain() {
            slot.handle.abort();
        }
    }
}
