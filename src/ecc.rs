//! # ECC key slots and signing
//!
//! 32 key slots, each holding a P-256 or Ed25519 private key that never
//! leaves the chip. Keys are generated on-chip or stored from the host;
//! ECDSA signs a SHA-256 digest (hashed on the host before it is sent),
//! EdDSA signs the message itself.
//!
//! ## Available Methods
//!
//! - [`ecc_key_generate`](Tropic01::ecc_key_generate) - Generate a key on the chip
//! - [`ecc_key_store`](Tropic01::ecc_key_store) - Store a host-provided key
//! - [`ecc_key_read`](Tropic01::ecc_key_read) - Read the public half of a slot
//! - [`ecc_key_erase`](Tropic01::ecc_key_erase) - Erase a slot
//! - [`ecdsa_sign`](Tropic01::ecdsa_sign) - ECDSA over SHA-256 of a message
//! - [`eddsa_sign`](Tropic01::eddsa_sign) - EdDSA over a message

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

use super::crypto::CryptoProvider;
use super::status::CmdResult;
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_ecc::*;

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Generate a fresh key pair of the given curve inside `slot`.
    pub async fn ecc_key_generate(&mut self, slot: u8, curve: EccCurve) -> Result<(), Tropic01Error> {
        if slot > ECC_SLOT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&ecc_key_generate_cmd(slot, curve), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, ECC_KEY_GENERATE_RES_SIZE)
    }

    /// Store the private key `k` into `slot`.
    pub async fn ecc_key_store(
        &mut self,
        slot: u8,
        curve: EccCurve,
        k: &[u8; 32],
    ) -> Result<(), Tropic01Error> {
        if slot > ECC_SLOT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&ecc_key_store_cmd(slot, curve, k), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, ECC_KEY_STORE_RES_SIZE)
    }

    /// Read curve, origin and public key of `slot`.
    ///
    /// An empty or erased slot reports [`InvalidKey`](Tropic01Error::InvalidKey).
    pub async fn ecc_key_read(&mut self, slot: u8) -> Result<EccKeyReadRsp, Tropic01Error> {
        if slot > ECC_SLOT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&ecc_key_read_cmd(slot), &[]).await?;
        match self.result_body(len)[0] {
            RESULT_ECC_INVALID_KEY => return Err(Tropic01Error::InvalidKey),
            r => CmdResult::from(r).check()?,
        }
        // pubkey length tells the curve apart; anything else is a framing
        // violation that ends the session
        if len != ECC_KEY_READ_RES_SIZE_ED25519 && len != ECC_KEY_READ_RES_SIZE_P256 {
            self.session_invalidate();
            return Err(Tropic01Error::RespSize);
        }
        let mut rsp = EccKeyReadRsp::new();
        rsp.as_mut()[..len].copy_from_slice(self.result_body(len));
        rsp.set_pub_len(len - 16);
        Ok(rsp)
    }

    /// Erase `slot`.
    pub async fn ecc_key_erase(&mut self, slot: u8) -> Result<(), Tropic01Error> {
        if slot > ECC_SLOT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&ecc_key_erase_cmd(slot), &[]).await?;
        CmdResult::from(self.result_body(len)[0]).check()?;
        self.check_res_size(len, ECC_KEY_ERASE_RES_SIZE)
    }

    /// ECDSA-sign `msg` with the P-256 key in `slot`.
    ///
    /// The message is hashed with SHA-256 on the host; the chip signs the
    /// digest. The slot must hold a P-256 key, anything else reports
    /// [`InvalidKey`](Tropic01Error::InvalidKey).
    pub async fn ecdsa_sign(&mut self, slot: u8, msg: &[u8]) -> Result<SignRsp, Tropic01Error> {
        if slot > ECC_SLOT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let msg_hash = self.crypto.sha256(&[msg]);
        let len = self.l3_cmd(&ecdsa_sign_cmd(slot, &msg_hash), &[]).await?;
        match self.result_body(len)[0] {
            RESULT_ECC_INVALID_KEY => return Err(Tropic01Error::InvalidKey),
            r => CmdResult::from(r).check()?,
        }
        self.check_res_size(len, SIGN_RES_SIZE)?;
        let mut rsp = SignRsp::new();
        rsp.as_mut().copy_from_slice(self.result_body(len));
        Ok(rsp)
    }

    /// EdDSA-sign `msg` with the Ed25519 key in `slot`.
    ///
    /// `msg` may hold up to [`EDDSA_MSG_LEN_MAX`] bytes. The slot must hold
    /// an Ed25519 key, anything else reports
    /// [`InvalidKey`](Tropic01Error::InvalidKey).
    pub async fn eddsa_sign(&mut self, slot: u8, msg: &[u8]) -> Result<SignRsp, Tropic01Error> {
        if slot > ECC_SLOT_MAX || msg.len() > EDDSA_MSG_LEN_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        let len = self.l3_cmd(&eddsa_sign_cmd(slot), msg).await?;
        match self.result_body(len)[0] {
            RESULT_ECC_INVALID_KEY => return Err(Tropic01Error::InvalidKey),
            r => CmdResult::from(r).check()?,
        }
        self.check_res_size(len, SIGN_RES_SIZE)?;
        let mut rsp = SignRsp::new();
        rsp.as_mut().copy_from_slice(self.result_body(len));
        Ok(rsp)
    }
}
