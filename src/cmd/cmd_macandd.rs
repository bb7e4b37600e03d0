// Mac-and-Destroy command API

pub const MAC_AND_DESTROY_CMD_ID: u8 = 0x90;

/// Highest Mac-and-Destroy slot index.
pub const MAC_AND_DESTROY_SLOT_MAX: u16 = 127;
/// Input and output block size of one sequence.
pub const MAC_AND_DESTROY_DATA_SIZE: usize = 32;

/// Result body size (result byte included).
pub const MAC_AND_DESTROY_RES_SIZE: usize = 36;

/// One Mac-and-Destroy sequence: MAC `data_in` with the slot state, then
/// overwrite the slot state with `data_in`.
pub fn mac_and_destroy_cmd(slot: u16, data_in: &[u8; MAC_AND_DESTROY_DATA_SIZE]) -> [u8; 36] {
    let mut cmd = [0u8; 36];
    cmd[0] = MAC_AND_DESTROY_CMD_ID;
    cmd[1..3].copy_from_slice(&slot.to_le_bytes());
    // cmd[3] padding
    cmd[4..36].copy_from_slice(data_in);
    cmd
}

// Response structs

/// Result body of a sequence: result, padding, MAC output.
pub struct MacAndDestroyRsp([u8; MAC_AND_DESTROY_RES_SIZE]);

impl Default for MacAndDestroyRsp {
    fn default() -> Self {
        MacAndDestroyRsp([0; MAC_AND_DESTROY_RES_SIZE])
    }
}

impl MacAndDestroyRsp {
    pub fn new() -> Self {
        Self::default()
    }

    /// MAC computed over the input with the pre-overwrite slot state.
    pub fn data_out(&self) -> &[u8] {
        &self.0[4..36]
    }
}

impl AsMut<[u8]> for MacAndDestroyRsp {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}
