//! # Mac-and-Destroy
//!
//! A Mac-and-Destroy slot holds a 32-byte state. One sequence MACs the input
//! with that state, hands the MAC back, and overwrites the state with the
//! input. Because reading destroys, each slot answers exactly one question.
//!
//! On top of the raw sequence this module implements the PIN verification
//! scheme from the chip documentation: every PIN attempt burns one slot, a
//! correct PIN recovers a master secret which re-arms all slots, and once all
//! attempts are burnt nothing recoverable remains.
//!
//! ## Available Methods
//!
//! - [`mac_and_destroy`](Tropic01::mac_and_destroy) - One raw M&D sequence
//! - [`macandd_pin_setup`](Tropic01::macandd_pin_setup) - Arm the PIN scheme
//! - [`macandd_pin_check`](Tropic01::macandd_pin_check) - Attempt a PIN entry

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use zeroize::Zeroizing;

use super::crypto::CryptoProvider;
use super::status::CmdResult;
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_macandd::*;

/// Most PIN attempts the scheme supports.
pub const MACANDD_ROUNDS_MAX: u8 = 12;
/// Accepted PIN length.
pub const MACANDD_PIN_SIZE_MIN: usize = 4;
pub const MACANDD_PIN_SIZE_MAX: usize = 8;
/// Most additional bytes (device id, user handle, ...) mixed into the KDF.
pub const MACANDD_ADD_SIZE_MAX: usize = 128;

/// Scheme state kept in one R-memory slot:
/// attempts left, tag `t`, one master-secret ciphertext per round.
const NVM_SIZE_MAX: usize =
    1 + 32 + MACANDD_ROUNDS_MAX as usize * MAC_AND_DESTROY_DATA_SIZE;

/// Where the PIN scheme keeps its state.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAndDestroyPinCfg {
    /// R-memory slot persisting attempts, tag and ciphertexts.
    pub nvm_slot: u16,
    /// PIN attempts before the secret is gone, 1..=[`MACANDD_ROUNDS_MAX`].
    /// M&D slots `0..rounds` are consumed by the scheme.
    pub rounds: u8,
}

impl MacAndDestroyPinCfg {
    fn check(&self) -> Result<(), Tropic01Error> {
        if self.rounds == 0
            || self.rounds > MACANDD_ROUNDS_MAX
            || self.nvm_slot > super::cmd::cmd_mem::R_MEM_DATA_SLOT_MAX
        {
            return Err(Tropic01Error::InvalidParam);
        }
        Ok(())
    }

    fn nvm_size(&self) -> usize {
        1 + 32 + self.rounds as usize * MAC_AND_DESTROY_DATA_SIZE
    }
}

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

fn check_pin_args(pin: &[u8], add: &[u8]) -> Result<(), Tropic01Error> {
    if pin.len() < MACANDD_PIN_SIZE_MIN
        || pin.len() > MACANDD_PIN_SIZE_MAX
        || add.len() > MACANDD_ADD_SIZE_MAX
    {
        return Err(Tropic01Error::InvalidParam);
    }
    Ok(())
}

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Run one Mac-and-Destroy sequence on `slot` and return the MAC output.
    pub async fn mac_and_destroy(
        &mut self,
        slot: u16,
        data_in: &[u8; MAC_AND_DESTROY_DATA_SIZE],
    ) -> Result<[u8; MAC_AND_DESTROY_DATA_SIZE], Tropic01Error> {
        if slot > MAC_AND_DESTROY_SLOT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&mac_and_destroy_cmd(slot, data_in), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, MAC_AND_DESTROY_RES_SIZE)?;
        let mut rsp = MacAndDestroyRsp::new();
        rsp.as_mut().copy_from_slice(self.result_body(len));
        let mut out = [0u8; MAC_AND_DESTROY_DATA_SIZE];
        out.copy_from_slice(rsp.data_out());
        Ok(out)
    }

    /// Arm the PIN scheme with a fresh `master_secret` and `pin`.
    ///
    /// `add` is optional extra material mixed into the key derivation (pass
    /// an empty slice when unused). Returns the key derived from the master
    /// secret; [`macandd_pin_check`](Self::macandd_pin_check) returns the
    /// same key for a correct PIN.
    pub async fn macandd_pin_setup(
        &mut self,
        master_secret: &[u8; 32],
        pin: &[u8],
        add: &[u8],
        cfg: &MacAndDestroyPinCfg,
    ) -> Result<[u8; 32], Tropic01Error> {
        cfg.check()?;
        check_pin_args(pin, add)?;

        let mut kdf_in = Zeroizing::new([0u8; MACANDD_PIN_SIZE_MAX + MACANDD_ADD_SIZE_MAX]);
        let kdf_len = pin.len() + add.len();
        kdf_in[..pin.len()].copy_from_slice(pin);
        kdf_in[pin.len()..kdf_len].copy_from_slice(add);

        let mut nvm = Zeroizing::new([0u8; NVM_SIZE_MAX]);
        nvm[0] = cfg.rounds;

        // t authenticates the recovered secret, u arms a slot, v is what a
        // PIN attempt feeds through the M&D sequence
        let t = Zeroizing::new(self.crypto.hmac_sha256(master_secret, &[&[0x00]]));
        let u = Zeroizing::new(self.crypto.hmac_sha256(master_secret, &[&[0x01]]));
        let v = Zeroizing::new(self.crypto.hmac_sha256(&[0u8; 32], &[&kdf_in[..kdf_len]]));
        nvm[1..33].copy_from_slice(t.as_ref());

        for i in 0..cfg.rounds {
            let slot = i as u16;
            self.mac_and_destroy(slot, &u).await?;
            let w = Zeroizing::new(self.mac_and_destroy(slot, &v).await?);
            self.mac_and_destroy(slot, &u).await?;

            let k = Zeroizing::new(self.crypto.hmac_sha256(w.as_ref(), &[&kdf_in[..kdf_len]]));
            let mask = Zeroizing::new(self.crypto.hmac_sha256(k.as_ref(), &[&[0x02]]));
            let ci = &mut nvm[33 + i as usize * 32..33 + (i as usize + 1) * 32];
            for (c, (s, m)) in ci.iter_mut().zip(master_secret.iter().zip(mask.iter())) {
                *c = s ^ m;
            }
        }

        self.r_mem_data_erase(cfg.nvm_slot).await?;
        self.r_mem_data_write(cfg.nvm_slot, &nvm[..cfg.nvm_size()])
            .await?;

        Ok(self.crypto.hmac_sha256(master_secret, &[b"2"]))
    }

    /// Attempt a PIN entry.
    ///
    /// A correct PIN returns the key from
    /// [`macandd_pin_setup`](Self::macandd_pin_setup) and restores the full
    /// attempt budget. A wrong PIN burns one attempt and reports
    /// [`PinFail`](Tropic01Error::PinFail); once every attempt is burnt the
    /// secret is unrecoverable and all further calls fail.
    pub async fn macandd_pin_check(
        &mut self,
        pin: &[u8],
        add: &[u8],
        cfg: &MacAndDestroyPinCfg,
    ) -> Result<[u8; 32], Tropic01Error> {
        cfg.check()?;
        check_pin_args(pin, add)?;

        let mut kdf_in = Zeroizing::new([0u8; MACANDD_PIN_SIZE_MAX + MACANDD_ADD_SIZE_MAX]);
        let kdf_len = pin.len() + add.len();
        kdf_in[..pin.len()].copy_from_slice(pin);
        kdf_in[pin.len()..kdf_len].copy_from_slice(add);

        let mut nvm = Zeroizing::new([0u8; NVM_SIZE_MAX]);
        let stored = self
            .r_mem_data_read(cfg.nvm_slot, nvm.as_mut())
            .await?;
        if stored != cfg.nvm_size() {
            return Err(Tropic01Error::Fail);
        }

        if nvm[0] == 0 {
            return Err(Tropic01Error::PinFail);
        }

        // burn the attempt before looking at the PIN
        nvm[0] -= 1;
        let i = nvm[0] as usize;
        self.r_mem_data_erase(cfg.nvm_slot).await?;
        self.r_mem_data_write(cfg.nvm_slot, &nvm[..cfg.nvm_size()])
            .await?;

        let v = Zeroizing::new(self.crypto.hmac_sha256(&[0u8; 32], &[&kdf_in[..kdf_len]]));
        let w = Zeroizing::new(self.mac_and_destroy(i as u16, &v).await?);
        let k = Zeroizing::new(self.crypto.hmac_sha256(w.as_ref(), &[&kdf_in[..kdf_len]]));
        let mask = Zeroizing::new(self.crypto.hmac_sha256(k.as_ref(), &[&[0x02]]));

        let mut secret = Zeroizing::new([0u8; 32]);
        for (s, (c, m)) in secret
            .iter_mut()
            .zip(nvm[33 + i * 32..33 + (i + 1) * 32].iter().zip(mask.iter()))
        {
            *s = c ^ m;
        }

        let tag = self.crypto.hmac_sha256(secret.as_ref(), &[&[0x00]]);
        if !ct_eq(&tag, &nvm[1..33]) {
            return Err(Tropic01Error::PinFail);
        }

        // correct PIN: re-arm every consumed slot and restore the budget
        let u = Zeroizing::new(self.crypto.hmac_sha256(secret.as_ref(), &[&[0x01]]));
        for x in i..cfg.rounds as usize {
            self.mac_and_destroy(x as u16, &u).await?;
        }
        nvm[0] = cfg.rounds;
        self.r_mem_data_erase(cfg.nvm_slot).await?;
        self.r_mem_data_write(cfg.nvm_slot, &nvm[..cfg.nvm_size()])
            .await?;

        Ok(self.crypto.hmac_sha256(secret.as_ref(), &[b"2"]))
    }
}
