//! Observers bound to the online flag.

use tracing::info;

/// Something that mirrors the watchdog's online flag, such as a status icon.
pub trait OnlineIndicator: Send + Sync {
    /// Called with the new value on every online/offline transition.
    fn set_online(&self, online: bool);
}

impl<F> OnlineIndicator for F
where
    F: Fn(bool) + Send + Sync,
{
    fn set_online(&self, online: bool) {
        self(online)
    }
}

/// Indicator that reports transitions through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl OnlineIndicator for LogIndicator {
    fn set_online(&self, online: bool) {
        if online {
            info!("Connection indicator: online");
        } else {
            info!("Connection indicator: offline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_indicator() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let indicator = move |online: bool| sink.lock().unwrap().push(online);

        indicator.set_online(true);
        indicator.set_online(false);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }
}
