//! What the host sees of a device.
//!
//! The host drives a device through named properties. Each get or set of a
//! property ends up in a handler that is told whether the host is about to read
//! the value ([`ActionType::BeforeGet`]) or has just written it
//! ([`ActionType::AfterSet`]). On a rejected write the handler puts the old
//! value back into the [`Property`].

use crate::error::WheelError;

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum ActionType {
    BeforeGet,
    AfterSet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        Self::Integer(v.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Value cell handed to property handlers
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: String,
    value: PropertyValue,
}

impl Property {
    pub fn new(name: &str, value: impl Into<PropertyValue>) -> Self {
        Property {
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn into_value(self) -> PropertyValue {
        self.value
    }

    pub fn set(&mut self, value: impl Into<PropertyValue>) {
        self.value = value.into();
    }

    /// The value as integer. Floats without a fractional part are accepted as
    /// well as strings that parse as integer.
    pub fn integer(&self) -> Result<i64, WheelError> {
        match &self.value {
            PropertyValue::Integer(v) => Ok(*v),
            PropertyValue::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            PropertyValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| WheelError::InvalidPropertyType(self.name.clone())),
            _ => Err(WheelError::InvalidPropertyType(self.name.clone())),
        }
    }

    pub fn string(&self) -> Result<&str, WheelError> {
        match &self.value {
            PropertyValue::String(s) => Ok(s),
            _ => Err(WheelError::InvalidPropertyType(self.name.clone())),
        }
    }
}

/// The capabilities the host expects from a device
pub trait Device {
    fn name(&self) -> &'static str;

    /// Names of all properties, in the order they should be shown
    fn property_names(&self) -> &'static [&'static str];

    fn get_property(&mut self, name: &str) -> Result<PropertyValue, WheelError>;

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), WheelError>;

    /// Whether the device is still settling after the last change
    fn busy(&self) -> bool;

    fn initialize(&mut self) -> Result<(), WheelError>;

    fn shutdown(&mut self) -> Result<(), WheelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_conversions() {
        assert_eq!(Property::new("p", 3i64).integer(), Ok(3));
        assert_eq!(Property::new("p", 4.0).integer(), Ok(4));
        assert_eq!(Property::new("p", " 5 ").integer(), Ok(5));
        assert_eq!(
            Property::new("p", 4.5).integer(),
            Err(WheelError::InvalidPropertyType("p".to_string()))
        );
        assert_eq!(
            Property::new("p", "five").integer(),
            Err(WheelError::InvalidPropertyType("p".to_string()))
        );
    }

    #[test]
    fn string_conversion() {
        assert_eq!(Property::new("p", "40154488").string(), Ok("40154488"));
        assert!(Property::new("p", 1i64).string().is_err());
    }
}
