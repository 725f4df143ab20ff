//! A one-shot broadcast signal.
//!
//! A [`Signal`] is fired at most once; every [`Notifier`] obtained from it, before or after the
//! fire, observes it as fired from then on. Firing again is a no-op.

use tokio::sync::watch;

/// The firing half, held by the cache.
#[derive(Debug)]
pub struct Signal(watch::Sender<bool>);

/// The waiting half, handed to readers.
#[derive(Clone, Debug)]
pub struct Notifier(watch::Receiver<bool>);

pub fn channel() -> (Signal, Notifier) {
    let (tx, rx) = watch::channel(false);
    (Signal(tx), Notifier(rx))
}

// === impl Signal ===

impl Signal {
    pub fn notifier(&self) -> Notifier {
        Notifier(self.0.subscribe())
    }

    pub fn fire(&self) {
        self.0.send_replace(true);
    }
}

// === impl Notifier ===

impl Notifier {
    pub fn is_fired(&self) -> bool {
        *self.0.borrow()
    }

    /// Completes when the signal fires.
    ///
    /// Returns `false` if the signal was dropped without ever firing.
    pub async fn fired(mut self) -> bool {
        let fired = self.0.wait_for(|fired| *fired).await.is_ok();
        fired
    }

    /// Returns true if both notifiers observe the same signal.
    pub fn same_signal(&self, other: &Self) -> bool {
        self.0.same_channel(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn all_notifiers_fire_together() {
        let (signal, first) = channel();
        let second = signal.notifier();
        assert!(first.same_signal(&second));

        let mut a = task::spawn(first.clone().fired());
        let mut b = task::spawn(second.fired());
        assert_pending!(a.poll());
        assert_pending!(b.poll());

        signal.fire();
        assert!(a.is_woken());
        assert!(b.is_woken());
        assert_ready_eq!(a.poll(), true);
        assert_ready_eq!(b.poll(), true);
        assert!(first.is_fired());
    }

    #[test]
    fn late_notifier_observes_fire() {
        let (signal, _) = channel();
        signal.fire();
        signal.fire();

        let late = signal.notifier();
        assert!(late.is_fired());
        let mut fired = task::spawn(late.fired());
        assert_ready_eq!(fired.poll(), true);
    }

    #[test]
    fn fired_signal_outlives_sender() {
        let (signal, notifier) = channel();
        signal.fire();
        drop(signal);

        let mut fired = task::spawn(notifier.fired());
        assert_ready_eq!(fired.poll(), true);
    }

    #[test]
    fn dropped_signal_never_fires() {
        let (signal, notifier) = channel();
        let mut fired = task::spawn(notifier.fired());
        assert_pending!(fired.poll());

        drop(signal);
        assert_ready_eq!(fired.poll(), false);
    }
}
