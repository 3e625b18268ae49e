//! Linux input event codes used by the detector
//!
//! Values mirror `linux/input-event-codes.h`. Only the codes that take part
//! in the sequence (and the layout alias) are named here; everything else is
//! passed through as a raw `u16`.

/// Event type for synchronization markers
pub const EV_SYN: u16 = 0x00;
/// Event type for key and button state changes
pub const EV_KEY: u16 = 0x01;

pub const KEY_ESC: u16 = 1;
pub const KEY_Q: u16 = 16;
pub const KEY_ENTER: u16 = 28;
pub const KEY_A: u16 = 30;
pub const KEY_B: u16 = 48;
pub const KEY_UP: u16 = 103;
pub const KEY_LEFT: u16 = 105;
pub const KEY_RIGHT: u16 = 106;
pub const KEY_DOWN: u16 = 108;

/// `input_event.value` for a key release
pub const VALUE_RELEASED: i32 = 0;
/// `input_event.value` for a key press
pub const VALUE_PRESSED: i32 = 1;
/// `input_event.value` for an autorepeat while held
pub const VALUE_REPEAT: i32 = 2;

/// Short uppercase name for a key code, used in logs
///
/// Returns `None` for codes the detector does not care about.
pub fn key_name(code: u16) -> Option<&'static str> {
    match code {
        KEY_ESC => Some("ESC"),
        KEY_Q => Some("Q"),
        KEY_ENTER => Some("ENTER"),
        KEY_A => Some("A"),
        KEY_B => Some("B"),
        KEY_UP => Some("UP"),
        KEY_LEFT => Some("LEFT"),
        KEY_RIGHT => Some("RIGHT"),
        KEY_DOWN => Some("DOWN"),
        _ => None,
    }
}

/// Whether an event denotes a key transitioning to (or held in) the pressed state
///
/// Any non-zero value counts, so autorepeat is treated like a fresh press.
pub fn is_key_down(event_type: u32, value: i32) -> bool {
    event_type == u32::from(EV_KEY) && value != VALUE_RELEASED
}
