//! # Device configuration
//!
//! Two copies of the configuration exist: the erasable R-config and the
//! irreversible I-config. At boot the chip combines them bitwise; a zero in
//! either copy wins. See [`ConfigObjAddr`] for the addressable objects.
//!
//! ## Available Methods
//!
//! - [`r_config_write`](Tropic01::r_config_write) - Write one R-config object
//! - [`r_config_read`](Tropic01::r_config_read) - Read one R-config object
//! - [`r_config_erase`](Tropic01::r_config_erase) - Erase the whole R-config
//! - [`i_config_write`](Tropic01::i_config_write) - Pull one I-config bit to zero
//! - [`i_config_read`](Tropic01::i_config_read) - Read one I-config object
//! - [`read_whole_r_config`](Tropic01::read_whole_r_config) /
//!   [`write_whole_r_config`](Tropic01::write_whole_r_config) - Bulk R-config transfer
//! - [`read_whole_i_config`](Tropic01::read_whole_i_config) - Bulk I-config read

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

use super::crypto::CryptoProvider;
use super::status::CmdResult;
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_config::*;

/// All 27 configuration objects, indexed in address order.
#[derive(Clone)]
pub struct WholeConfig {
    pub objs: [u32; ConfigObjAddr::ALL.len()],
}

impl Default for WholeConfig {
    /// Erased state: every bit set.
    fn default() -> Self {
        Self {
            objs: [u32::MAX; ConfigObjAddr::ALL.len()],
        }
    }
}

impl WholeConfig {
    /// Value of one object.
    pub fn get(&self, addr: ConfigObjAddr) -> u32 {
        let idx = ConfigObjAddr::ALL
            .iter()
            .position(|a| *a == addr)
            .unwrap_or(0);
        self.objs[idx]
    }

    /// Replace the value of one object.
    pub fn set(&mut self, addr: ConfigObjAddr, value: u32) {
        if let Some(idx) = ConfigObjAddr::ALL.iter().position(|a| *a == addr) {
            self.objs[idx] = value;
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
    /// Write one R-config object. The object must be in erased state.
    pub async fn r_config_write(
        &mut self,
        addr: ConfigObjAddr,
        value: u32,
    ) -> Result<(), Tropic01Error> {
        let len = self.l3_cmd(&r_config_write_cmd(addr, value), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, CONFIG_WRITE_RES_SIZE)
    }

    /// Read one R-config object.
    pub async fn r_config_read(&mut self, addr: ConfigObjAddr) -> Result<u32, Tropic01Error> {
        let len = self.l3_cmd(&r_config_read_cmd(addr), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, CONFIG_READ_RES_SIZE)?;
        let mut rsp = ConfigReadRsp::new();
        rsp.as_mut().copy_from_slice(self.result_body(len));
        Ok(rsp.value())
    }

    /// Erase the whole R-config back to all ones.
    pub async fn r_config_erase(&mut self) -> Result<(), Tropic01Error> {
        let len = self.l3_cmd(&r_config_erase_cmd(), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, CONFIG_ERASE_RES_SIZE)
    }

    /// Pull one I-config bit to zero. There is no way back.
    ///
    /// Note: application firmware older than 2.0.0 acknowledges this command
    /// even when the write did not take effect; read the object back when
    /// running against such firmware.
    pub async fn i_config_write(
        &mut self,
        addr: ConfigObjAddr,
        bit_index: u8,
    ) -> Result<(), Tropic01Error> {
        if bit_index > 31 {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self
            .l3_cmd(&i_config_write_cmd(addr, bit_index), &[])
            .await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, CONFIG_WRITE_RES_SIZE)
    }

    /// Read one I-config object.
    pub async fn i_config_read(&mut self, addr: ConfigObjAddr) -> Result<u32, Tropic01Error> {
        let len = self.l3_cmd(&i_config_read_cmd(addr), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, CONFIG_READ_RES_SIZE)?;
        let mut rsp = ConfigReadRsp::new();
        rsp.as_mut().copy_from_slice(self.result_body(len));
        Ok(rsp.value())
    }

    /// Read every R-config object.
    pub async fn read_whole_r_config(&mut self) -> Result<WholeConfig, Tropic01Error> {
        let mut config = WholeConfig::default();
        for (idx, addr) in ConfigObjAddr::ALL.iter().enumerate() {
            config.objs[idx] = self.r_config_read(*addr).await?;
        }
        Ok(config)
    }

    /// Write every R-config object. The R-config must be erased first.
    pub async fn write_whole_r_config(&mut self, config: &WholeConfig) -> Result<(), Tropic01Error> {
        for (idx, addr) in ConfigObjAddr::ALL.iter().enumerate() {
            self.r_config_write(*addr, config.objs[idx]).await?;
        }
        Ok(())
    }

    /// Read every I-config object.
    pub async fn read_whole_i_config(&mut self) -> Result<WholeConfig, Tropic01Error> {
        let mut config = WholeConfig::default();
        for (idx, addr) in ConfigObjAddr::ALL.iter().enumerate() {
            config.objs[idx] = self.i_config_read(*addr).await?;
        }
        Ok(config)
    }
}
