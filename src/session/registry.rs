use crate::{error::WheelError, util::ensure};
use std::sync::{Mutex, PoisonError};

// serial numbers (significant part) of every session that is currently open
static LIVE_SESSIONS: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Claim on a serial number, released when dropped
#[derive(Debug)]
pub(super) struct LiveSlot(String);

impl LiveSlot {
    pub fn claim(serial: &str) -> Result<Self, WheelError> {
        let mut live = LIVE_SESSIONS.lock().unwrap_or_else(PoisonError::into_inner);
        ensure!(
            !live.iter().any(|s| s == serial),
            WheelError::SessionAlreadyOpen(serial.to_string())
        );
        live.push(serial.to_string());
        Ok(LiveSlot(serial.to_string()))
    }
}

impl Drop for LiveSlot {
    fn drop(&mut self) {
        LIVE_SESSIONS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| *s != self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_twice() {
        let slot = LiveSlot::claim("49000001").unwrap();
        assert_eq!(
            LiveSlot::claim("49000001").unwrap_err(),
            WheelError::SessionAlreadyOpen("49000001".to_string())
        );
        drop(slot);
        assert!(LiveSlot::claim("49000001").is_ok());
    }
}
