use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

/// A flag that can be raised any number of times, and observed independently by any number of watchers.
///
/// Each [`FlagWatch`] sees a raise exactly once, no matter how many other watchers there are.
#[derive(Debug, Clone, Default)]
pub struct Flag(Arc<AtomicU64>);

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.0.fetch_add(1, Relaxed);
    }

    /// a watcher that only observes raises that happen after this call
    pub fn watch(&self) -> FlagWatch {
        FlagWatch {
            seen: self.0.load(Relaxed),
            flag: self.0.clone(),
        }
    }
}

#[derive(Debug)]
pub struct FlagWatch {
    flag: Arc<AtomicU64>,
    seen: u64,
}

impl FlagWatch {
    /// returns true if the flag was raised since the last call
    pub fn take(&mut self) -> bool {
        let now = self.flag.load(Relaxed);
        if now != self.seen {
            self.seen = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[test]
fn watchers_are_independent() {
    let flag = Flag::new();
    flag.signal();
    let mut a = flag.watch();
    let mut b = flag.watch();
    assert!(!a.take(), "watch saw a raise from before it was created");
    flag.signal();
    flag.signal();
    assert!(a.take());
    assert!(!a.take());
    assert!(b.take());
}
