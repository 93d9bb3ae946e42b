//! Names the device and its properties are known by to the host

macro_rules! makepl {
    ($($name:ident, $val:literal),*) => {
        $(pub const $name: &str = $val;)*
    };
}

#[rustfmt::skip]
makepl!(
    DEVICE_NAME, "FW103H Filter Wheel",
    DEVICE_DESCRIPTION, "Thorlabs FW103H filter wheel driver",
    NAME, "Name",
    DESCRIPTION, "Description",
    SERIAL_NUMBER, "Serial Number",
    POLL_TIME, "Poll Time (ms)",
    DELAY, "Delay (ms)",
    STATE, "Set filter wheel position (0-5)",
    ANGLE, "Set filter wheel position (degrees)",
    SPEED, "Speed"
);

pub const PROPERTIES: &[&str] = &[
    NAME,
    DESCRIPTION,
    SERIAL_NUMBER,
    POLL_TIME,
    DELAY,
    STATE,
    ANGLE,
    SPEED,
];
