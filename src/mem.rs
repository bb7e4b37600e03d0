//! # User R-memory
//!
//! 512 general purpose flash slots. A slot takes one write between erases;
//! writing an occupied slot is refused and leaves the stored data intact.
//! How many bytes fit one slot depends on the application firmware, see
//! [`Tr01Attrs`](crate::system::Tr01Attrs).
//!
//! ## Available Methods
//!
//! - [`r_mem_data_write`](Tropic01::r_mem_data_write) - Write a slot
//! - [`r_mem_data_read`](Tropic01::r_mem_data_read) - Read a slot
//! - [`r_mem_data_erase`](Tropic01::r_mem_data_erase) - Erase a slot

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

use super::crypto::CryptoProvider;
use super::status::CmdResult;
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_mem::*;

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Write `data` into an erased user-memory slot.
    ///
    /// `data` must hold between [`R_MEM_DATA_SIZE_MIN`] and
    /// `attrs().r_mem_udata_slot_size_max` bytes. An occupied slot reports
    /// [`SlotNotEmpty`](Tropic01Error::SlotNotEmpty) and keeps its content.
    pub async fn r_mem_data_write(
        &mut self,
        udata_slot: u16,
        data: &[u8],
    ) -> Result<(), Tropic01Error> {
        if udata_slot > R_MEM_DATA_SLOT_MAX
            || data.len() < R_MEM_DATA_SIZE_MIN
            || data.len() > self.attrs.r_mem_udata_slot_size_max as usize
        {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self
            .l3_cmd(&r_mem_data_write_cmd(udata_slot), data)
            .await?;
        match self.result_body(len)[0] {
            RESULT_R_MEM_DATA_WRITE_FAIL => return Err(Tropic01Error::SlotNotEmpty),
            RESULT_R_MEM_DATA_SLOT_EXPIRED => return Err(Tropic01Error::SlotExpired),
            r => CmdResult::from(r).check()?,
        }
        self.check_res_size(len, R_MEM_DATA_WRITE_RES_SIZE)
    }

    /// Read a user-memory slot into `data`. Returns the number of bytes the
    /// slot held; an erased slot reports [`SlotEmpty`](Tropic01Error::SlotEmpty).
    pub async fn r_mem_data_read(
        &mut self,
        udata_slot: u16,
        data: &mut [u8],
    ) -> Result<usize, Tropic01Error> {
        if udata_slot > R_MEM_DATA_SLOT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&r_mem_data_read_cmd(udata_slot), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        if len < R_MEM_DATA_READ_RES_SIZE_MIN
            || len > R_MEM_DATA_READ_RES_SIZE_MIN + self.attrs.r_mem_udata_slot_size_max as usize
        {
            self.session_invalidate();
            return Err(Tropic01Error::RespSize);
        }
        let stored = len - R_MEM_DATA_READ_RES_SIZE_MIN;
        if stored == 0 {
            return Err(Tropic01Error::SlotEmpty);
        }
        if data.len() < stored {
            return Err(Tropic01Error::InvalidParam);
        }
        data[..stored]
            .copy_from_slice(&self.result_body(len)[R_MEM_DATA_READ_RES_SIZE_MIN..]);
        Ok(stored)
    }

    /// Erase a user-memory slot, making it writable again.
    pub async fn r_mem_data_erase(&mut self, udata_slot: u16) -> Result<(), Tropic01Error> {
        if udata_slot > R_MEM_DATA_SLOT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&r_mem_data_erase_cmd(udata_slot), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, R_MEM_DATA_ERASE_RES_SIZE)
    }
}
