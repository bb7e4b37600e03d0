// Ping and random number commands

/// Echo command id.
pub const PING_CMD_ID: u8 = 0x01;
/// Longest message a ping can carry.
pub const PING_LEN_MAX: usize = 4096;
/// Result body of an empty echo: the result byte.
pub const PING_RES_SIZE_MIN: usize = 1;

/// Random value command id.
pub const RANDOM_VALUE_GET_CMD_ID: u8 = 0x50;
/// Most random bytes one command can return.
pub const RANDOM_VALUE_GET_LEN_MAX: usize = 255;
/// Result body of an empty draw: result byte plus three padding bytes.
pub const RANDOM_VALUE_GET_RES_SIZE_MIN: usize = 4;

/// Echo request header; the message follows as the variable tail.
pub fn ping_cmd() -> [u8; 1] {
    [PING_CMD_ID]
}

/// Draw `n_bytes` from the chip's TRNG.
pub fn random_value_get_cmd(n_bytes: u8) -> [u8; 2] {
    [RANDOM_VALUE_GET_CMD_ID, n_bytes]
}
