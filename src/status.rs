//! # Chip status byte and protocol status codes
//!
//! Three kinds of status flow through the protocol stack:
//!
//! - [`ChipStatus`]: the byte the chip clocks out against the first MOSI byte
//!   of every read. Carries the READY/ALARM/STARTUP mode bits.
//! - [`L2Status`]: the status byte of an L2 response frame. Classifies the
//!   previous request and drives the chunking of encrypted command packets.
//! - [`CmdResult`]: the result byte inside a decrypted L3 result. Reports the
//!   outcome of the command itself. A handful of additional per-command codes
//!   are matched where the commands are parsed.

use super::Tropic01Error;

/// Chip status: READY bit 0, ALARM bit 1, STARTUP bit 2.
#[derive(Default, Clone, Copy)]
pub struct ChipStatus(u8);

impl ChipStatus {
    /// Chip accepts a new request / has a response ready.
    pub fn ready(&self) -> bool {
        (self.0 & 0x01) != 0
    }

    /// Chip entered alarm mode. Any further operation is refused.
    pub fn alarm(&self) -> bool {
        (self.0 & 0x02) != 0
    }

    /// Chip runs its bootloader (maintenance mode). The INT pin is not driven.
    pub fn startup(&self) -> bool {
        (self.0 & 0x04) != 0
    }

    /// Raw status byte.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl From<u8> for ChipStatus {
    fn from(value: u8) -> Self {
        ChipStatus(value)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChipStatus {
    fn format(&self, fmt: defmt::Formatter) {
        if self.alarm() {
            defmt::write!(fmt, "ALARM");
            return;
        }
        defmt::write!(fmt, "{}", if self.ready() { "ready" } else { "busy" });
        if self.startup() {
            defmt::write!(fmt, " | startup mode");
        }
    }
}

/// Status byte of an L2 response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum L2Status {
    /// Request frame accepted
    RequestOk,
    /// Result frame follows, this was the last chunk of it
    ResultOk,
    /// Request chunk accepted, chip expects more chunks
    RequestCont,
    /// Result chunk delivered, more chunks pending
    ResultCont,
    /// Chip agreed to go to sleep
    SleepOk,
    /// Handshake request could not be verified
    HskErr,
    /// No session is open on the chip
    NoSession,
    /// Authentication tag of an encrypted packet did not verify
    TagErr,
    /// Chip saw a CRC mismatch in our request
    CrcErr,
    /// Request id not recognized
    UnknownReq,
    /// Generic failure
    GenErr,
    /// Interface disabled by device configuration
    Disabled,
    /// Truncated-MAC failure
    TmacErr,
    /// Anything else; raw byte kept for diagnostics
    Unknown(u8),
}

impl From<u8> for L2Status {
    fn from(value: u8) -> Self {
        match value {
            0x01 => L2Status::RequestOk,
            0x02 => L2Status::ResultOk,
            0x03 => L2Status::RequestCont,
            0x04 => L2Status::ResultCont,
            0x79 => L2Status::HskErr,
            0x7A => L2Status::NoSession,
            0x7B => L2Status::TagErr,
            0x7C => L2Status::CrcErr,
            0x7E => L2Status::UnknownReq,
            0x7F => L2Status::GenErr,
            0x80 => L2Status::Disabled,
            0x81 => L2Status::TmacErr,
            0x82 => L2Status::SleepOk,
            v => L2Status::Unknown(v),
        }
    }
}

impl L2Status {
    /// Map error statuses to driver errors. Flow statuses (both OK and both
    /// CONT variants, plus `SleepOk`) pass; the caller tells them apart.
    pub fn check(&self) -> Result<(), Tropic01Error> {
        match self {
            L2Status::RequestOk
            | L2Status::ResultOk
            | L2Status::RequestCont
            | L2Status::ResultCont
            | L2Status::SleepOk => Ok(()),
            L2Status::HskErr => Err(Tropic01Error::HskErr),
            L2Status::NoSession => Err(Tropic01Error::SessionErr),
            L2Status::TagErr => Err(Tropic01Error::TagErr),
            L2Status::CrcErr => Err(Tropic01Error::CrcErr),
            L2Status::UnknownReq => Err(Tropic01Error::UnknownReq),
            L2Status::GenErr => Err(Tropic01Error::GenErr),
            L2Status::Disabled => Err(Tropic01Error::DisabledErr),
            L2Status::TmacErr => Err(Tropic01Error::TmacErr),
            L2Status::Unknown(v) => Err(Tropic01Error::StatusUnknown(*v)),
        }
    }
}

/// Result byte of a decrypted L3 result, command-independent part.
///
/// Several commands overload the 0x10..0x16 range with their own meanings
/// (counter underflow, occupied memory slot, invalidated pairing key, ...);
/// those are matched in the respective command modules before this generic
/// classification applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CmdResult {
    Ok,
    Fail,
    Unauthorized,
    InvalidCmd,
    HardwareFail,
    Other(u8),
}

/// RESULT byte: command executed.
pub const RESULT_OK: u8 = 0xC3;
/// RESULT byte: command failed.
pub const RESULT_FAIL: u8 = 0x3C;
/// RESULT byte: access not granted for the current pairing key.
pub const RESULT_UNAUTHORIZED: u8 = 0x01;
/// RESULT byte: command id invalid.
pub const RESULT_INVALID_CMD: u8 = 0x02;
/// RESULT byte: hardware fault.
pub const RESULT_HARDWARE_FAIL: u8 = 0x04;

impl From<u8> for CmdResult {
    fn from(value: u8) -> Self {
        match value {
            RESULT_OK => CmdResult::Ok,
            RESULT_FAIL => CmdResult::Fail,
            RESULT_UNAUTHORIZED => CmdResult::Unauthorized,
            RESULT_INVALID_CMD => CmdResult::InvalidCmd,
            RESULT_HARDWARE_FAIL => CmdResult::HardwareFail,
            v => CmdResult::Other(v),
        }
    }
}

impl CmdResult {
    /// Check the result and return Ok/Err.
    pub fn check(&self) -> Result<(), Tropic01Error> {
        match self {
            CmdResult::Ok => Ok(()),
            CmdResult::Fail => Err(Tropic01Error::Fail),
            CmdResult::Unauthorized => Err(Tropic01Error::Unauthorized),
            CmdResult::InvalidCmd => Err(Tropic01Error::InvalidCmd),
            CmdResult::HardwareFail => Err(Tropic01Error::HardwareFail),
            CmdResult::Other(v) => Err(Tropic01Error::ResultUnknown(*v)),
        }
    }
}
