//! Input side - event codes and keyboard readers

pub mod codes;
pub mod device;

pub use device::{
    discover_keyboards, dispatch, print_keyboards, pump_events, read_device, simulate, EventSource,
};
