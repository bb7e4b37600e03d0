//! # Pairing key management
//!
//! The chip stores up to four host X25519 public keys ("pairing keys"); one
//! of them authenticates every Secure Session handshake. Slots can be
//! written once, read back and irreversibly invalidated.
//!
//! ## Available Methods
//!
//! - [`pairing_key_write`](Tropic01::pairing_key_write) - Store a host public key
//! - [`pairing_key_read`](Tropic01::pairing_key_read) - Read a stored public key
//! - [`pairing_key_invalidate`](Tropic01::pairing_key_invalidate) - Retire a slot for good

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

use super::crypto::CryptoProvider;
use super::status::CmdResult;
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_pairing::*;

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Store a host pairing public key into an empty slot.
    ///
    /// Note: application firmware older than 2.0.0 acknowledges this command
    /// even when the write did not take effect; read the slot back when
    /// running against such firmware.
    pub async fn pairing_key_write(
        &mut self,
        slot: PairingKeySlot,
        pairing_pub: &[u8; 32],
    ) -> Result<(), Tropic01Error> {
        let len = self
            .l3_cmd(&pairing_key_write_cmd(slot, pairing_pub), &[])
            .await?;
        match self.result_body(len)[0] {
            RESULT_PAIRING_KEY_INVALID => return Err(Tropic01Error::SlotInvalid),
            r => CmdResult::from(r).check()?,
        }
        self.check_res_size(len, PAIRING_KEY_WRITE_RES_SIZE)
    }

    /// Read the pairing public key stored in a slot.
    ///
    /// An unwritten slot reports [`SlotEmpty`](Tropic01Error::SlotEmpty), an
    /// invalidated one [`SlotInvalid`](Tropic01Error::SlotInvalid).
    pub async fn pairing_key_read(
        &mut self,
        slot: PairingKeySlot,
    ) -> Result<[u8; 32], Tropic01Error> {
        let len = self.l3_cmd(&pairing_key_read_cmd(slot), &[]).await?;
        match self.result_body(len)[0] {
            RESULT_PAIRING_KEY_EMPTY => return Err(Tropic01Error::SlotEmpty),
            RESULT_PAIRING_KEY_INVALID => return Err(Tropic01Error::SlotInvalid),
            r => CmdResult::from(r).check()?,
        }
        self.check_res_size(len, PAIRING_KEY_READ_RES_SIZE)?;
        let mut rsp = PairingKeyReadRsp::new();
        rsp.as_mut().copy_from_slice(self.result_body(len));
        let mut key = [0u8; 32];
        key.copy_from_slice(rsp.pairing_pub());
        Ok(key)
    }

    /// Invalidate a pairing key slot. The slot can never be used again.
    ///
    /// Subject to the same pre-2.0.0 firmware caveat as
    /// [`pairing_key_write`](Self::pairing_key_write).
    pub async fn pairing_key_invalidate(
        &mut self,
        slot: PairingKeySlot,
    ) -> Result<(), Tropic01Error> {
        let len = self.l3_cmd(&pairing_key_invalidate_cmd(slot), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, PAIRING_KEY_INVALIDATE_RES_SIZE)
    }
}
