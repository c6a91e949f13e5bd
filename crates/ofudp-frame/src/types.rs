//! OpenFlow message type codes.
//!
//! Only the codes shared by OpenFlow 1.0 through 1.5 up to `FLOW_MOD` are
//! named here; the transport itself never interprets the type byte.

/// OpenFlow 1.3 wire version.
pub const OFP_VERSION_1_3: u8 = 0x04;

/// Symmetric hello, first message on every connection.
pub const HELLO: u8 = 0;

/// Error notification.
pub const ERROR: u8 = 1;

/// Liveness check.
pub const ECHO_REQUEST: u8 = 2;

/// Reply to [`ECHO_REQUEST`], echoing xid and body.
pub const ECHO_REPLY: u8 = 3;

pub const EXPERIMENTER: u8 = 4;
pub const FEATURES_REQUEST: u8 = 5;
pub const FEATURES_REPLY: u8 = 6;
pub const GET_CONFIG_REQUEST: u8 = 7;
pub const GET_CONFIG_REPLY: u8 = 8;
pub const SET_CONFIG: u8 = 9;
pub const PACKET_IN: u8 = 10;
pub const FLOW_REMOVED: u8 = 11;
pub const PORT_STATUS: u8 = 12;
pub const PACKET_OUT: u8 = 13;
pub const FLOW_MOD: u8 = 14;

const NAMES: [(u8, &str); 15] = [
    (HELLO, "HELLO"),
    (ERROR, "ERROR"),
    (ECHO_REQUEST, "ECHO_REQUEST"),
    (ECHO_REPLY, "ECHO_REPLY"),
    (EXPERIMENTER, "EXPERIMENTER"),
    (FEATURES_REQUEST, "FEATURES_REQUEST"),
    (FEATURES_REPLY, "FEATURES_REPLY"),
    (GET_CONFIG_REQUEST, "GET_CONFIG_REQUEST"),
    (GET_CONFIG_REPLY, "GET_CONFIG_REPLY"),
    (SET_CONFIG, "SET_CONFIG"),
    (PACKET_IN, "PACKET_IN"),
    (FLOW_REMOVED, "FLOW_REMOVED"),
    (PORT_STATUS, "PORT_STATUS"),
    (PACKET_OUT, "PACKET_OUT"),
    (FLOW_MOD, "FLOW_MOD"),
];

/// Returns a human-readable name for a message type code.
pub fn msg_type_name(msg_type: u8) -> &'static str {
    NAMES
        .iter()
        .find(|(code, _)| *code == msg_type)
        .map_or("UNKNOWN", |(_, name)| name)
}

/// Parse a type name (case-insensitive, `-` or `_` separated) or a decimal code.
pub fn parse_msg_type(input: &str) -> Option<u8> {
    if let Ok(code) = input.parse::<u8>() {
        return Some(code);
    }
    let wanted = input.trim().replace('-', "_").to_ascii_uppercase();
    NAMES
        .iter()
        .find(|(_, name)| *name == wanted)
        .map(|(code, _)| *code)
}
