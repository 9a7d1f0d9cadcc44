use std::sync::atomic::{AtomicBool, Ordering};

/// The network-availability signal the flows branch on.
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

/// Connectivity flag flipped by the host whenever it observes an
/// online/offline transition.
#[derive(Debug)]
pub struct NetworkStatus {
    online: AtomicBool,
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        Self { online: AtomicBool::new(online) }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            log::info!("Network status changed: {}", if online { "online" } else { "offline" });
        }
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for NetworkStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl<C: Connectivity + ?Sized> Connectivity for &C {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}
