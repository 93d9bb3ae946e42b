#[cfg(test)]
mod tests;

pub mod map;

use crate::{
    config::WheelConfig,
    device::{ActionType, Device, Property, PropertyValue},
    error::WheelError,
    kinesis::Kinesis,
    session::{DeviceIdentity, Session},
    util::ensure,
};
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Device types this crate registers with the host, as `(name, description)`
pub const REGISTERED_DEVICES: [(&str, &str); 1] = [(map::DEVICE_NAME, map::DEVICE_DESCRIPTION)];

/// Creates the device registered under `name`, `None` for names this crate
/// doesn't know
pub fn create_device<K: Kinesis + 'static>(
    name: &str,
    hardware: K,
    config: WheelConfig,
) -> Option<Box<dyn Device>> {
    match name {
        map::DEVICE_NAME => Some(Box::new(FilterWheel::new(hardware, config))),
        _ => None,
    }
}

//

/// The FW103H as the host sees it
///
/// Caches position and speed for the host and forwards changes to a
/// [`Session`]. Serial number and poll time can only be set before
/// [`initialize`][FilterWheel::initialize]. Dropping the wheel shuts it down.
#[derive(Debug)]
pub struct FilterWheel<K: Kinesis> {
    config: WheelConfig,
    // exactly one of these holds the hardware handle
    hardware: Option<K>,
    session: Option<Session<K>>,
    initialized: bool,
    position: u32,
    speed: u32,
    // the busy window runs on the monotonic clock, a wall clock step would
    // stretch or cut it
    changed_at: Option<Instant>,
    last_change: Option<DateTime<Local>>,
}

impl<K: Kinesis> FilterWheel<K> {
    pub fn new(hardware: K, config: WheelConfig) -> Self {
        FilterWheel {
            speed: config.session.max_speed,
            config,
            hardware: Some(hardware),
            session: None,
            initialized: false,
            position: 0,
            changed_at: None,
            last_change: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &WheelConfig {
        &self.config
    }

    /// The session, if initialization was attempted
    pub fn session(&self) -> Option<&Session<K>> {
        self.session.as_ref()
    }

    /// Cached position index
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Cached speed
    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn set_delay_ms(&mut self, ms: u64) {
        self.config.delay_ms = ms;
    }

    /// Wall clock time of the last position change requested by the host
    pub fn last_change(&self) -> Option<DateTime<Local>> {
        self.last_change
    }

    /// Returns `true` until the configured delay has passed since the last
    /// position change
    pub fn busy(&self) -> bool {
        let delay = Duration::from_millis(self.config.delay_ms);
        self.changed_at.map_or(false, |t| t.elapsed() < delay)
    }

    fn start_busy_timer(&mut self) {
        self.changed_at = Some(Instant::now());
        self.last_change = Some(Local::now());
    }

    fn session_mut(&mut self) -> Result<&mut Session<K>, WheelError> {
        match &mut self.session {
            Some(session) if self.initialized => Ok(session),
            _ => Err(WheelError::SessionClosed),
        }
    }

    /// Opens the session and homes the wheel. Does nothing if already
    /// initialized.
    ///
    /// A failed attempt keeps the session around. If it is faulted, only
    /// [`shutdown`][FilterWheel::shutdown] makes another attempt possible.
    pub fn initialize(&mut self) -> Result<(), WheelError> {
        if self.initialized {
            return Ok(());
        }
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let hardware = self.hardware.take().ok_or(WheelError::SessionClosed)?;
                Session::new(
                    hardware,
                    DeviceIdentity::new(self.config.serial_number.clone()),
                    self.config.session.clone(),
                )
            }
        };
        let session = self.session.insert(session);
        session.open()?;
        let max_speed = self.config.session.max_speed;
        match session.speed() {
            Ok(speed) => self.speed = (speed.round().max(0.0) as u32).min(max_speed),
            Err(e) => warn!(%e, "couldn't read speed, keeping {}", self.speed),
        }
        self.position = session.position();
        // not busy until the first change
        self.changed_at = None;
        self.initialized = true;
        debug!(serial = %self.config.serial_number, speed = self.speed, "initialized");
        Ok(())
    }

    /// Closes the session. Safe to call any number of times.
    pub fn shutdown(&mut self) -> Result<(), WheelError> {
        self.initialized = false;
        if let Some(mut session) = self.session.take() {
            let result = session.close();
            self.hardware = Some(session.into_hardware());
            result?;
            debug!(serial = %self.config.serial_number, "shut down");
        }
        Ok(())
    }

    //

    pub fn on_name(&mut self, prop: &mut Property, act: ActionType) -> Result<(), WheelError> {
        read_only(prop, act, map::DEVICE_NAME)
    }

    pub fn on_description(
        &mut self,
        prop: &mut Property,
        act: ActionType,
    ) -> Result<(), WheelError> {
        read_only(prop, act, map::DEVICE_DESCRIPTION)
    }

    pub fn on_serial_number(
        &mut self,
        prop: &mut Property,
        act: ActionType,
    ) -> Result<(), WheelError> {
        if act == ActionType::AfterSet {
            let result = self.change_serial_number(prop);
            if result.is_err() {
                prop.set(self.config.serial_number.as_str());
            }
            return result;
        }
        prop.set(self.config.serial_number.as_str());
        Ok(())
    }

    fn change_serial_number(&mut self, prop: &Property) -> Result<(), WheelError> {
        let serial = prop.string()?;
        ensure!(!self.initialized, WheelError::SerialNumberChangeForbidden);
        if let Some(session) = &mut self.session {
            session.set_identity(DeviceIdentity::new(serial))?;
        }
        self.config.serial_number = serial.to_string();
        Ok(())
    }

    pub fn on_poll_time(&mut self, prop: &mut Property, act: ActionType) -> Result<(), WheelError> {
        if act == ActionType::AfterSet {
            let result = self.change_poll_time(prop);
            if result.is_err() {
                prop.set(self.config.session.poll_interval_ms);
            }
            return result;
        }
        prop.set(self.config.session.poll_interval_ms);
        Ok(())
    }

    fn change_poll_time(&mut self, prop: &Property) -> Result<(), WheelError> {
        let ms = prop.integer()?;
        ensure!(!self.initialized, WheelError::PollChangeForbidden);
        let interval = u32::try_from(ms)
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or(WheelError::InvalidPollInterval(ms))?;
        if let Some(session) = &mut self.session {
            session.set_poll_interval(ms)?;
        }
        self.config.session.poll_interval_ms = interval;
        Ok(())
    }

    pub fn on_delay(&mut self, prop: &mut Property, act: ActionType) -> Result<(), WheelError> {
        if act == ActionType::AfterSet {
            match prop.integer().and_then(|ms| {
                u64::try_from(ms).map_err(|_| WheelError::InvalidPropertyType(map::DELAY.into()))
            }) {
                Ok(ms) => self.set_delay_ms(ms),
                Err(e) => {
                    prop.set(self.delay_value());
                    return Err(e);
                }
            }
        }
        prop.set(self.delay_value());
        Ok(())
    }

    fn delay_value(&self) -> i64 {
        i64::try_from(self.config.delay_ms).unwrap_or(i64::MAX)
    }

    pub fn on_state(&mut self, prop: &mut Property, act: ActionType) -> Result<(), WheelError> {
        let result = match act {
            ActionType::BeforeGet => Ok(()),
            ActionType::AfterSet => self.move_to(prop),
        };
        prop.set(self.position);
        result
    }

    fn move_to(&mut self, prop: &Property) -> Result<(), WheelError> {
        let index = prop.integer()?;
        ensure!(
            (0..i64::from(crate::config::NUM_POSITIONS)).contains(&index),
            WheelError::InvalidPosition(index)
        );
        self.start_busy_timer();
        let session = self.session_mut()?;
        session.set_position(index)?;
        let reached = session.position();
        self.position = reached;
        Ok(())
    }

    pub fn on_speed(&mut self, prop: &mut Property, act: ActionType) -> Result<(), WheelError> {
        let result = match act {
            ActionType::BeforeGet => Ok(()),
            ActionType::AfterSet => self.change_speed(prop),
        };
        prop.set(self.speed);
        result
    }

    fn change_speed(&mut self, prop: &Property) -> Result<(), WheelError> {
        let speed = prop.integer()?;
        let max_speed = self.config.session.max_speed;
        let speed = u32::try_from(speed)
            .ok()
            .filter(|s| *s <= max_speed)
            .ok_or(WheelError::InvalidSpeed(speed))?;
        self.session_mut()?.set_speed(speed.into())?;
        // 0 leaves the hardware untouched
        if speed != 0 {
            self.speed = speed;
        }
        Ok(())
    }

    /// Angle the device reports right now. Setting it isn't supported.
    pub fn on_angle(&mut self, prop: &mut Property, act: ActionType) -> Result<(), WheelError> {
        match act {
            ActionType::BeforeGet => {
                let angle = self.session_mut()?.angle()?;
                prop.set(angle);
                Ok(())
            }
            ActionType::AfterSet => Err(WheelError::NotImplemented),
        }
    }

    fn dispatch(
        &mut self,
        name: &str,
        prop: &mut Property,
        act: ActionType,
    ) -> Result<(), WheelError> {
        match name {
            map::NAME => self.on_name(prop, act),
            map::DESCRIPTION => self.on_description(prop, act),
            map::SERIAL_NUMBER => self.on_serial_number(prop, act),
            map::POLL_TIME => self.on_poll_time(prop, act),
            map::DELAY => self.on_delay(prop, act),
            map::STATE => self.on_state(prop, act),
            map::ANGLE => self.on_angle(prop, act),
            map::SPEED => self.on_speed(prop, act),
            _ => Err(WheelError::UnknownProperty(name.to_string())),
        }
    }
}

fn read_only(prop: &mut Property, act: ActionType, value: &str) -> Result<(), WheelError> {
    let result = match act {
        ActionType::BeforeGet => Ok(()),
        ActionType::AfterSet => Err(WheelError::ReadOnlyProperty(prop.name().to_string())),
    };
    prop.set(value);
    result
}

impl<K: Kinesis> Device for FilterWheel<K> {
    fn name(&self) -> &'static str {
        map::DEVICE_NAME
    }

    fn property_names(&self) -> &'static [&'static str] {
        map::PROPERTIES
    }

    fn get_property(&mut self, name: &str) -> Result<PropertyValue, WheelError> {
        let mut prop = Property::new(name, 0i64);
        self.dispatch(name, &mut prop, ActionType::BeforeGet)?;
        Ok(prop.into_value())
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), WheelError> {
        let mut prop = Property::new(name, value);
        self.dispatch(name, &mut prop, ActionType::AfterSet)
    }

    fn busy(&self) -> bool {
        FilterWheel::busy(self)
    }

    fn initialize(&mut self) -> Result<(), WheelError> {
        FilterWheel::initialize(self)
    }

    fn shutdown(&mut self) -> Result<(), WheelError> {
        FilterWheel::shutdown(self)
    }
}

impl<K: Kinesis> Drop for FilterWheel<K> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(%e, "shutdown on drop failed");
        }
    }
}
