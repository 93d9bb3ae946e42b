use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use thiserror::Error;

/// Status codes handed to the host, each with a fixed message.
///
/// Raw Kinesis codes are passed through unchanged and are not part of this
/// table, see [`WheelError::Hardware`].
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, FromPrimitive)]
pub enum ErrorCode {
    UnknownProperty = 2,
    InvalidPropertyType = 3,
    ReadOnlyProperty = 4,
    InvalidPosition = 100,
    InvalidSpeed = 101,
    MoveTimeout = 102,
    HomeTimeout = 103,
    PollChangeForbidden = 104,
    SerialNumberChangeForbidden = 105,
    SessionFaulted = 106,
    DeviceNotFound = 107,
    SessionAlreadyOpen = 108,
    SessionClosed = 109,
    InvalidPollInterval = 110,
    NotImplemented = 120,
}

impl ErrorCode {
    /// Every code in the table, in ascending order
    pub const ALL: [ErrorCode; 15] = [
        Self::UnknownProperty,
        Self::InvalidPropertyType,
        Self::ReadOnlyProperty,
        Self::InvalidPosition,
        Self::InvalidSpeed,
        Self::MoveTimeout,
        Self::HomeTimeout,
        Self::PollChangeForbidden,
        Self::SerialNumberChangeForbidden,
        Self::SessionFaulted,
        Self::DeviceNotFound,
        Self::SessionAlreadyOpen,
        Self::SessionClosed,
        Self::InvalidPollInterval,
        Self::NotImplemented,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// The text registered with the host for this code
    pub fn message(self) -> &'static str {
        match self {
            Self::UnknownProperty => "Unknown property.",
            Self::InvalidPropertyType => "Invalid property value type.",
            Self::ReadOnlyProperty => "Property is read-only.",
            Self::InvalidPosition => "Invalid filter wheel position.",
            Self::InvalidSpeed => "Invalid filter wheel speed.",
            Self::MoveTimeout => {
                "Device timed-out: no response received within expected time interval after moving."
            }
            Self::HomeTimeout => {
                "Device timed-out: no response received within expected time interval after homing."
            }
            Self::PollChangeForbidden => "Poll time can't be changed once the device is initialized.",
            Self::SerialNumberChangeForbidden => {
                "Serial number can't be changed once the device is initialized."
            }
            Self::SessionFaulted => {
                "Device timed-out earlier, shut it down and initialize it again."
            }
            Self::DeviceNotFound => "No connected FW103H device with this serial number.",
            Self::SessionAlreadyOpen => "A session for this serial number is already open.",
            Self::SessionClosed => "Device is not initialized.",
            Self::InvalidPollInterval => "Poll time must be a positive number of milliseconds.",
            Self::NotImplemented => "Command not implemented.",
        }
    }
}

/// Looks up the message for a status code. Returns `None` for codes that aren't
/// in the table, e.g. raw Kinesis codes.
pub fn error_text(code: i32) -> Option<&'static str> {
    ErrorCode::from_i32(code).map(ErrorCode::message)
}

/// Errors returned by any part of the filter wheel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WheelError {
    /// Requested position index is outside `0..6`
    #[error("invalid filter wheel position {0}")]
    InvalidPosition(i64),
    /// Requested speed is outside `0..=max_speed`
    #[error("invalid filter wheel speed {0}")]
    InvalidSpeed(i64),
    /// No completion message arrived within the move timeout
    #[error("no response received within {0} ms after moving")]
    MoveTimeout(u64),
    /// No completion message arrived within the home timeout
    #[error("no response received within {0} ms after homing")]
    HomeTimeout(u64),
    #[error("poll time can't be changed once the device is initialized")]
    PollChangeForbidden,
    #[error("serial number can't be changed once the device is initialized")]
    SerialNumberChangeForbidden,
    /// A previous timeout left the session unusable until it is closed
    #[error("session is faulted, close it before sending further commands")]
    SessionFaulted,
    #[error("no device with serial number {0} found")]
    DeviceNotFound(String),
    #[error("a session for serial number {0} is already open")]
    SessionAlreadyOpen(String),
    #[error("session is not open")]
    SessionClosed,
    #[error("poll time must be positive, was {0}")]
    InvalidPollInterval(i64),
    #[error("command not implemented")]
    NotImplemented,
    #[error("unknown property {0:?}")]
    UnknownProperty(String),
    #[error("invalid value type for property {0:?}")]
    InvalidPropertyType(String),
    #[error("property {0:?} is read-only")]
    ReadOnlyProperty(String),
    /// Nonzero return code of a Kinesis call, passed through as is
    #[error("kinesis call failed with code {0}")]
    Hardware(i16),
}

impl WheelError {
    /// Returns the table entry for this error, `None` for [`WheelError::Hardware`]
    pub fn error_code(&self) -> Option<ErrorCode> {
        Some(match self {
            Self::InvalidPosition(_) => ErrorCode::InvalidPosition,
            Self::InvalidSpeed(_) => ErrorCode::InvalidSpeed,
            Self::MoveTimeout(_) => ErrorCode::MoveTimeout,
            Self::HomeTimeout(_) => ErrorCode::HomeTimeout,
            Self::PollChangeForbidden => ErrorCode::PollChangeForbidden,
            Self::SerialNumberChangeForbidden => ErrorCode::SerialNumberChangeForbidden,
            Self::SessionFaulted => ErrorCode::SessionFaulted,
            Self::DeviceNotFound(_) => ErrorCode::DeviceNotFound,
            Self::SessionAlreadyOpen(_) => ErrorCode::SessionAlreadyOpen,
            Self::SessionClosed => ErrorCode::SessionClosed,
            Self::InvalidPollInterval(_) => ErrorCode::InvalidPollInterval,
            Self::NotImplemented => ErrorCode::NotImplemented,
            Self::UnknownProperty(_) => ErrorCode::UnknownProperty,
            Self::InvalidPropertyType(_) => ErrorCode::InvalidPropertyType,
            Self::ReadOnlyProperty(_) => ErrorCode::ReadOnlyProperty,
            Self::Hardware(_) => return None,
        })
    }

    /// Integer status code handed to the host
    pub fn code(&self) -> i32 {
        match self {
            Self::Hardware(code) => i32::from(*code),
            e => e.error_code().map_or(0, ErrorCode::code),
        }
    }

    /// Returns `true` if the error leaves the session faulted
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::MoveTimeout(_) | Self::HomeTimeout(_))
    }
}

/// Converts a host call result into its status code, 0 on success
pub fn status_code<T>(result: &Result<T, WheelError>) -> i32 {
    result.as_ref().map_or_else(WheelError::code, |_| 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_consistent() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_i32(code.code()), Some(code));
            assert!(!code.message().is_empty());
        }
    }

    #[test]
    fn error_codes() {
        assert_eq!(WheelError::InvalidPosition(6).code(), 100);
        assert_eq!(WheelError::InvalidSpeed(-1).code(), 101);
        assert_eq!(WheelError::MoveTimeout(5000).code(), 102);
        assert_eq!(WheelError::HomeTimeout(5000).code(), 103);
        assert_eq!(WheelError::PollChangeForbidden.code(), 104);
        assert_eq!(WheelError::NotImplemented.code(), 120);
        assert_eq!(WheelError::Hardware(37).code(), 37);
        assert_eq!(WheelError::Hardware(37).error_code(), None);
    }

    #[test]
    fn text_lookup() {
        assert_eq!(error_text(100), Some("Invalid filter wheel position."));
        assert_eq!(error_text(101), Some("Invalid filter wheel speed."));
        assert!(error_text(103).unwrap().contains("after homing"));
        assert_eq!(error_text(0), None);
        assert_eq!(error_text(99), None);
    }

    #[test]
    fn status_of_results() {
        assert_eq!(status_code(&Ok::<_, WheelError>(())), 0);
        assert_eq!(status_code::<()>(&Err(WheelError::SessionFaulted)), 106);
    }
}
