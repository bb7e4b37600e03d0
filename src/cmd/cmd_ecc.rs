// ECC key and signing commands API

pub const ECC_KEY_GENERATE_CMD_ID: u8 = 0x60;
pub const ECC_KEY_STORE_CMD_ID: u8 = 0x61;
pub const ECC_KEY_READ_CMD_ID: u8 = 0x62;
pub const ECC_KEY_ERASE_CMD_ID: u8 = 0x63;
pub const ECDSA_SIGN_CMD_ID: u8 = 0x70;
pub const EDDSA_SIGN_CMD_ID: u8 = 0x71;

/// Highest ECC key slot index.
pub const ECC_SLOT_MAX: u8 = 31;
/// Longest message accepted by the EdDSA sign command.
pub const EDDSA_MSG_LEN_MAX: usize = 4096;

/// Result body sizes (result byte included).
pub const ECC_KEY_GENERATE_RES_SIZE: usize = 1;
pub const ECC_KEY_STORE_RES_SIZE: usize = 1;
pub const ECC_KEY_READ_RES_SIZE_ED25519: usize = 48;
pub const ECC_KEY_READ_RES_SIZE_P256: usize = 80;
pub const ECC_KEY_ERASE_RES_SIZE: usize = 1;
pub const SIGN_RES_SIZE: usize = 80;

/// RESULT byte: the slot holds no usable key.
pub const RESULT_ECC_INVALID_KEY: u8 = 0x12;

/// Curve of an ECC key slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EccCurve {
    /// NIST P-256, used by ECDSA_Sign
    P256 = 1,
    /// Ed25519, used by EdDSA_Sign
    Ed25519 = 2,
}

/// How a key ended up in its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EccKeyOrigin {
    /// Generated on the chip; the private part never existed outside it
    Generated = 1,
    /// Stored from the host
    Stored = 2,
    /// Unrecognized origin byte
    Unknown = 0,
}

impl From<u8> for EccKeyOrigin {
    fn from(value: u8) -> Self {
        match value {
            1 => EccKeyOrigin::Generated,
            2 => EccKeyOrigin::Stored,
            _ => EccKeyOrigin::Unknown,
        }
    }
}

/// Generate a fresh key pair inside a slot.
pub fn ecc_key_generate_cmd(slot: u8, curve: EccCurve) -> [u8; 4] {
    let mut cmd = [0u8; 4];
    cmd[0] = ECC_KEY_GENERATE_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    cmd[3] = curve as u8;
    cmd
}

/// Store a host-provided private key into a slot.
pub fn ecc_key_store_cmd(slot: u8, curve: EccCurve, k: &[u8; 32]) -> [u8; 48] {
    let mut cmd = [0u8; 48];
    cmd[0] = ECC_KEY_STORE_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    cmd[3] = curve as u8;
    // cmd[4..16] padding
    cmd[16..48].copy_from_slice(k);
    cmd
}

/// Read the public key of a slot.
pub fn ecc_key_read_cmd(slot: u8) -> [u8; 3] {
    let mut cmd = [0u8; 3];
    cmd[0] = ECC_KEY_READ_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    cmd
}

/// Erase a key slot.
pub fn ecc_key_erase_cmd(slot: u8) -> [u8; 3] {
    let mut cmd = [0u8; 3];
    cmd[0] = ECC_KEY_ERASE_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    cmd
}

/// ECDSA sign a SHA-256 digest with the P-256 key in `slot`.
pub fn ecdsa_sign_cmd(slot: u8, msg_hash: &[u8; 32]) -> [u8; 48] {
    let mut cmd = [0u8; 48];
    cmd[0] = ECDSA_SIGN_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    // cmd[3..16] padding
    cmd[16..48].copy_from_slice(msg_hash);
    cmd
}

/// EdDSA sign header; the message follows as the variable tail.
pub fn eddsa_sign_cmd(slot: u8) -> [u8; 16] {
    let mut cmd = [0u8; 16];
    cmd[0] = EDDSA_SIGN_CMD_ID;
    cmd[1..3].copy_from_slice(&(slot as u16).to_le_bytes());
    // cmd[3..16] padding
    cmd
}

// Response structs

/// Result body of an ECC key read: result, curve, origin, padding, then a
/// 32-byte (Ed25519) or 64-byte (P-256) public key.
pub struct EccKeyReadRsp {
    buf: [u8; ECC_KEY_READ_RES_SIZE_P256],
    pub_len: usize,
}

impl Default for EccKeyReadRsp {
    fn default() -> Self {
        EccKeyReadRsp {
            buf: [0; ECC_KEY_READ_RES_SIZE_P256],
            pub_len: 0,
        }
    }
}

impl EccKeyReadRsp {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_pub_len(&mut self, pub_len: usize) {
        self.pub_len = pub_len;
    }

    /// Curve of the stored key, when recognized.
    pub fn curve(&self) -> Option<EccCurve> {
        match self.buf[1] {
            1 => Some(EccCurve::P256),
            2 => Some(EccCurve::Ed25519),
            _ => None,
        }
    }

    /// Origin of the stored key.
    pub fn origin(&self) -> EccKeyOrigin {
        self.buf[2].into()
    }

    /// Public key bytes; length follows the curve.
    pub fn pub_key(&self) -> &[u8] {
        &self.buf[16..16 + self.pub_len]
    }
}

impl AsMut<[u8]> for EccKeyReadRsp {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

/// Result body of a signature: result, padding, then R and S.
pub struct SignRsp([u8; SIGN_RES_SIZE]);

impl Default for SignRsp {
    fn default() -> Self {
        SignRsp([0; SIGN_RES_SIZE])
    }
}

impl SignRsp {
    pub fn new() -> Self {
        Self::default()
    }

    /// R part of the signature.
    pub fn r(&self) -> &[u8] {
        &self.0[16..48]
    }

    /// S part of the signature.
    pub fn s(&self) -> &[u8] {
        &self.0[48..80]
    }

    /// Signature as the usual R || S concatenation.
    pub fn signature(&self) -> [u8; 64] {
        let mut sig = [0u8; 64];
        sig.copy_from_slice(&self.0[16..80]);
        sig
    }
}

impl AsMut<[u8]> for SignRsp {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}
