//! # Chip information and lifecycle
//!
//! Everything here runs at L2, outside the Secure Session: identity and
//! firmware queries, reboots, sleep and the firmware update channel of the
//! bootloader.
//!
//! ## Available Methods
//!
//! ### Information
//! - [`get_info_chip_id`](Tropic01::get_info_chip_id) - Read the 128-byte chip identity
//! - [`get_info_riscv_fw_ver`](Tropic01::get_info_riscv_fw_ver) - Main firmware version
//! - [`get_info_spect_fw_ver`](Tropic01::get_info_spect_fw_ver) - SPECT firmware version
//! - [`get_info_fw_bank`](Tropic01::get_info_fw_bank) - Firmware bank header
//! - [`get_info_cert_store`](Tropic01::get_info_cert_store) - Certificate store
//! - [`get_log`](Tropic01::get_log) - Fetch the firmware log buffer
//!
//! ### Mode and power
//! - [`mode`](Tropic01::mode) - Classify the current chip mode
//! - [`reboot`](Tropic01::reboot) - Restart into application or maintenance mode
//! - [`sleep`](Tropic01::sleep) - Put the chip to sleep
//!
//! ### Firmware update
//! - [`mutable_fw_update`](Tropic01::mutable_fw_update) - Rewrite a firmware bank

use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

use super::crypto::CryptoProvider;
use super::l2::{
    L2_GET_INFO_REQ_ID, L2_GET_LOG_REQ_ID, L2_MUTABLE_FW_UPDATE_DATA_ID,
    L2_MUTABLE_FW_UPDATE_REQ_ID, L2_SLEEP_REQ_ID, L2_STARTUP_REQ_ID,
};
use super::status::L2Status;
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_info::*;

/// Time the chip needs before it answers probes after a reboot request.
const REBOOT_DELAY: Duration = Duration::from_millis(100);

/// Largest firmware image accepted by [`mutable_fw_update`](Tropic01::mutable_fw_update).
pub const MUTABLE_FW_UPDATE_SIZE_MAX: usize = 30720;
/// Data bytes per firmware update chunk.
const FW_UPDATE_CHUNK_SIZE: usize = 248;

/// Mode the chip currently executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tr01Mode {
    /// Application firmware is running
    App,
    /// Bootloader (maintenance mode) is running
    Startup,
}

/// Device attributes derived from the reported firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tr01Attrs {
    /// Largest payload one user R-memory slot takes.
    pub r_mem_udata_slot_size_max: u16,
}

impl Default for Tr01Attrs {
    fn default() -> Self {
        // conservative pre-2.0.0 limit until init() has asked the chip
        Self {
            r_mem_udata_slot_size_max: 444,
        }
    }
}

impl Tr01Attrs {
    /// Derive the attributes from a RISC-V firmware version.
    /// Version bytes are little-endian, `ver[3]` is the major number.
    pub fn from_riscv_fw_ver(ver: [u8; 4]) -> Self {
        Self {
            r_mem_udata_slot_size_max: if ver[3] >= 2 { 475 } else { 444 },
        }
    }
}

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    async fn get_info(
        &mut self,
        object: GetInfoObject,
        block_index: u8,
    ) -> Result<usize, Tropic01Error> {
        self.l2_request(L2_GET_INFO_REQ_ID, &get_info_req(object, block_index))
            .await
    }

    /// Read the 128-byte chip identity.
    pub async fn get_info_chip_id(&mut self) -> Result<ChipId, Tropic01Error> {
        let len = self.get_info(GetInfoObject::ChipId, 0).await?;
        if len != 128 {
            return Err(Tropic01Error::RespSize);
        }
        let mut chip_id = ChipId::new();
        chip_id.as_mut().copy_from_slice(self.l2buf.rsp_data());
        Ok(chip_id)
    }

    /// RISC-V firmware version: `[hotfix, patch, minor, major]`. Reports the
    /// bootloader version while the chip is in maintenance mode.
    pub async fn get_info_riscv_fw_ver(&mut self) -> Result<[u8; 4], Tropic01Error> {
        let len = self.get_info(GetInfoObject::RiscvFwVersion, 0).await?;
        if len != 4 {
            return Err(Tropic01Error::RespSize);
        }
        let mut ver = [0u8; 4];
        ver.copy_from_slice(self.l2buf.rsp_data());
        Ok(ver)
    }

    /// SPECT coprocessor firmware version, same byte order as
    /// [`get_info_riscv_fw_ver`](Self::get_info_riscv_fw_ver).
    pub async fn get_info_spect_fw_ver(&mut self) -> Result<[u8; 4], Tropic01Error> {
        let len = self.get_info(GetInfoObject::SpectFwVersion, 0).await?;
        if len != 4 {
            return Err(Tropic01Error::RespSize);
        }
        let mut ver = [0u8; 4];
        ver.copy_from_slice(self.l2buf.rsp_data());
        Ok(ver)
    }

    /// Header of one firmware bank, copied into `header`. Returns the header
    /// length. Only answered in maintenance mode.
    pub async fn get_info_fw_bank(
        &mut self,
        bank: FwBankId,
        header: &mut [u8],
    ) -> Result<usize, Tropic01Error> {
        let len = self.get_info(GetInfoObject::FwBank, bank as u8).await?;
        if header.len() < len {
            return Err(Tropic01Error::InvalidParam);
        }
        header[..len].copy_from_slice(self.l2buf.rsp_data());
        Ok(len)
    }

    /// Fetch the certificate store into `buf` and parse its layout.
    ///
    /// `buf` must hold the whole store; [`CERT_STORE_SIZE_MAX`] bytes always
    /// suffice. The device certificate (entry 0) carries the chip's static
    /// public key, see [`get_st_pub`].
    pub async fn get_info_cert_store(
        &mut self,
        buf: &mut [u8],
    ) -> Result<CertStore, Tropic01Error> {
        let mut got = 0usize;
        let mut store: Option<CertStore> = None;
        for block in 0..CERT_STORE_BLOCKS_MAX {
            let len = self.get_info(GetInfoObject::X509Certificate, block).await?;
            if got + len > buf.len() {
                return Err(Tropic01Error::InvalidParam);
            }
            buf[got..got + len].copy_from_slice(self.l2buf.rsp_data());
            got += len;

            if store.is_none() {
                store = CertStore::parse(&buf[..got]);
            }
            if let Some(ref s) = store {
                if got >= s.total_size() {
                    return Ok(*s);
                }
            }
            if len == 0 {
                break;
            }
        }
        Err(Tropic01Error::RespSize)
    }

    /// Classify the current chip mode with a single status probe.
    pub async fn mode(&mut self) -> Result<Tr01Mode, Tropic01Error> {
        let status = self.l1_probe().await?;
        if status.alarm() {
            return Err(Tropic01Error::AlarmMode);
        }
        Ok(if status.startup() {
            Tr01Mode::Startup
        } else {
            Tr01Mode::App
        })
    }

    /// Restart the chip into application or maintenance mode.
    ///
    /// Terminates any Secure Session. The call returns once the chip answers
    /// status probes again.
    pub async fn reboot(&mut self, startup_id: StartupId) -> Result<(), Tropic01Error> {
        self.l2_request(L2_STARTUP_REQ_ID, &startup_req(startup_id))
            .await?;
        self.session_invalidate();
        Timer::after(REBOOT_DELAY).await;
        self.wait_chip_ready().await
    }

    /// Put the chip to sleep. The device side of any Secure Session is torn
    /// down; the next L2 request wakes the chip.
    pub async fn sleep(&mut self, kind: SleepKind) -> Result<(), Tropic01Error> {
        let status = self.l2_transfer(L2_SLEEP_REQ_ID, &sleep_req(kind)).await?;
        status.check()?;
        if status != L2Status::SleepOk {
            return Err(Tropic01Error::StatusUnknown(self.l2buf.status()));
        }
        self.session_invalidate();
        Ok(())
    }

    /// Drain the firmware log buffer into `msg`. Returns the number of bytes
    /// read. Needs logging enabled in the firmware build.
    pub async fn get_log(&mut self, msg: &mut [u8]) -> Result<usize, Tropic01Error> {
        let mut got = 0usize;
        loop {
            let len = self.l2_request(L2_GET_LOG_REQ_ID, &[]).await?;
            if len == 0 {
                return Ok(got);
            }
            let take = core::cmp::min(len, msg.len() - got);
            msg[got..got + take].copy_from_slice(&self.l2buf.rsp_data()[..take]);
            got += take;
            if got == msg.len() {
                return Ok(got);
            }
        }
    }

    /// Erase and rewrite one mutable firmware bank.
    ///
    /// Only accepted in maintenance mode (see
    /// [`reboot`](Self::reboot) with [`StartupId::MaintenanceReboot`]); the
    /// new firmware starts on the next regular reboot.
    pub async fn mutable_fw_update(
        &mut self,
        bank: FwBankId,
        fw_data: &[u8],
    ) -> Result<(), Tropic01Error> {
        if fw_data.is_empty() || fw_data.len() > MUTABLE_FW_UPDATE_SIZE_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        self.l2_request(L2_MUTABLE_FW_UPDATE_REQ_ID, &mutable_fw_update_req(bank))
            .await?;

        let mut offset = 0usize;
        while offset < fw_data.len() {
            let n = core::cmp::min(FW_UPDATE_CHUNK_SIZE, fw_data.len() - offset);
            let mut payload = [0u8; 2 + FW_UPDATE_CHUNK_SIZE];
            payload[..2].copy_from_slice(&mutable_fw_update_data(offset as u16));
            payload[2..2 + n].copy_from_slice(&fw_data[offset..offset + n]);
            self.l2_request(L2_MUTABLE_FW_UPDATE_DATA_ID, &payload[..2 + n])
                .await?;
            offset += n;
        }
        Ok(())
    }
}
