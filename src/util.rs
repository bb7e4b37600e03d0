//! # Ping, random numbers and small helpers
//!
//! ## Available Methods
//!
//! - [`ping`](Tropic01::ping) - Echo a message through the Secure Session
//! - [`random_value_get`](Tropic01::random_value_get) - Draw bytes from the chip TRNG
//!
//! [`Hex`] formats byte strings for error reports and logs.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

use super::crypto::CryptoProvider;
use super::status::CmdResult;
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_util::*;

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Echo `msg_out` through the Secure Session into `msg_in`.
    ///
    /// Both buffers must have the same length, at most
    /// [`PING_LEN_MAX`] bytes. Mostly useful to exercise a fresh session.
    pub async fn ping(&mut self, msg_out: &[u8], msg_in: &mut [u8]) -> Result<(), Tropic01Error> {
        if msg_out.len() > PING_LEN_MAX || msg_in.len() != msg_out.len() {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&ping_cmd(), msg_out).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, PING_RES_SIZE_MIN + msg_out.len())?;
        msg_in.copy_from_slice(&self.result_body(len)[1..]);
        Ok(())
    }

    /// Fill `rnd` from the chip's TRNG. At most
    /// [`RANDOM_VALUE_GET_LEN_MAX`] bytes per call.
    pub async fn random_value_get(&mut self, rnd: &mut [u8]) -> Result<(), Tropic01Error> {
        if rnd.len() > RANDOM_VALUE_GET_LEN_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self
            .l3_cmd(&random_value_get_cmd(rnd.len() as u8), &[])
            .await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, RANDOM_VALUE_GET_RES_SIZE_MIN + rnd.len())?;
        rnd.copy_from_slice(&self.result_body(len)[RANDOM_VALUE_GET_RES_SIZE_MIN..]);
        Ok(())
    }
}

/// Hex formatting adapter: `Hex(&[0xDE, 0xAD])` displays as `DEAD`.
pub struct Hex<'a>(pub &'a [u8]);

impl core::fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Hex<'_> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=[u8]:02x}", self.0);
    }
}
