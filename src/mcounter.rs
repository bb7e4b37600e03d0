//! # Monotonic counters
//!
//! 16 decrement-only counters. A counter is initialized to a value and can
//! then only count down; at zero, further decrements are refused. Good for
//! enforcing usage limits that survive resets.
//!
//! ## Available Methods
//!
//! - [`mcounter_init`](Tropic01::mcounter_init) - Set a counter to an initial value
//! - [`mcounter_update`](Tropic01::mcounter_update) - Decrement a counter by one
//! - [`mcounter_get`](Tropic01::mcounter_get) - Read a counter

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

use super::crypto::CryptoProvider;
use super::status::CmdResult;
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_mcounter::*;

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Initialize counter `index` to `value`.
    pub async fn mcounter_init(&mut self, index: u16, value: u32) -> Result<(), Tropic01Error> {
        if index > MCOUNTER_INDEX_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&mcounter_init_cmd(index, value), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, MCOUNTER_INIT_RES_SIZE)
    }

    /// Decrement counter `index` by one.
    ///
    /// A counter at zero reports [`UpdateErr`](Tropic01Error::UpdateErr) and
    /// stays at zero; an uninitialized one
    /// [`CounterInvalid`](Tropic01Error::CounterInvalid).
    pub async fn mcounter_update(&mut self, index: u16) -> Result<(), Tropic01Error> {
        if index > MCOUNTER_INDEX_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&mcounter_update_cmd(index), &[]).await?;
        match self.result_body(len)[0] {
            RESULT_MCOUNTER_UPDATE_ERR => return Err(Tropic01Error::UpdateErr),
            RESULT_MCOUNTER_COUNTER_INVALID => return Err(Tropic01Error::CounterInvalid),
            r => CmdResult::from(r).check()?,
        }
        self.check_res_size(len, MCOUNTER_UPDATE_RES_SIZE)
    }

    /// Read counter `index`.
    pub async fn mcounter_get(&mut self, index: u16) -> Result<u32, Tropic01Error> {
        if index > MCOUNTER_INDEX_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&mcounter_get_cmd(index), &[]).await?;
        match self.result_body(len)[0] {
            RESULT_MCOUNTER_COUNTER_INVALID => return Err(Tropic01Error::CounterInvalid),
            r => CmdResult::from(r).check()?,
        }
        self.check_res_size(len, MCOUNTER_GET_RES_SIZE)?;
        let mut rsp = McounterGetRsp::new();
        rsp.as_mut().copy_from_slice(self.result_body(len));
        Ok(rsp.value())
    }
}
