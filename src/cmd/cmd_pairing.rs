// Pairing key commands API

pub const PAIRING_KEY_WRITE_CMD_ID: u8 = 0x10;
pub const PAIRING_KEY_READ_CMD_ID: u8 = 0x11;
pub const PAIRING_KEY_INVALIDATE_CMD_ID: u8 = 0x12;

/// Result body sizes (result byte included).
pub const PAIRING_KEY_WRITE_RES_SIZE: usize = 1;
pub const PAIRING_KEY_READ_RES_SIZE: usize = 36;
pub const PAIRING_KEY_INVALIDATE_RES_SIZE: usize = 1;

/// RESULT byte: the slot was never written.
pub const RESULT_PAIRING_KEY_EMPTY: u8 = 0x15;
/// RESULT byte: the slot was invalidated.
pub const RESULT_PAIRING_KEY_INVALID: u8 = 0x16;

/// Pairing key slot. The chip stores up to four host public keys used to
/// authenticate the Secure Session handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingKeySlot {
    Sh0 = 0,
    Sh1 = 1,
    Sh2 = 2,
    Sh3 = 3,
}

impl TryFrom<u8> for PairingKeySlot {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PairingKeySlot::Sh0),
            1 => Ok(PairingKeySlot::Sh1),
            2 => Ok(PairingKeySlot::Sh2),
            3 => Ok(PairingKeySlot::Sh3),
            _ => Err(()),
        }
    }
}

/// Store a host pairing public key into a slot.
pub fn pairing_key_write_cmd(slot: PairingKeySlot, pairing_pub: &[u8; 32]) -> [u8; 36] {
    let mut cmd = [0u8; 36];
    cmd[0] = PAIRING_KEY_WRITE_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    // cmd[3] padding
    cmd[4..36].copy_from_slice(pairing_pub);
    cmd
}

/// Read back the public key stored in a slot.
pub fn pairing_key_read_cmd(slot: PairingKeySlot) -> [u8; 3] {
    let mut cmd = [0u8; 3];
    cmd[0] = PAIRING_KEY_READ_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    cmd
}

/// Invalidate a slot. The key can never be used or rewritten again.
pub fn pairing_key_invalidate_cmd(slot: PairingKeySlot) -> [u8; 3] {
    let mut cmd = [0u8; 3];
    cmd[0] = PAIRING_KEY_INVALIDATE_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    cmd
}

// Response structs

/// Result body of a pairing key read: result, padding, public key.
pub struct PairingKeyReadRsp([u8; PAIRING_KEY_READ_RES_SIZE]);

impl Default for PairingKeyReadRsp {
    fn default() -> Self {
        PairingKeyReadRsp([0; PAIRING_KEY_READ_RES_SIZE])
    }
}

impl PairingKeyReadRsp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored pairing public key.
    pub fn pairing_pub(&self) -> &[u8] {
        &self.0[4..36]
    }
}

impl AsMut<[u8]> for PairingKeyReadRsp {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}
