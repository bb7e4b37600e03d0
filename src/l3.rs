//! # L3 packet engine
//!
//! An encrypted packet is `[size:2 LE][ciphertext:size][tag:16]`, where the
//! plaintext behind the ciphertext is the command body: a command id byte
//! followed by its arguments. Both directions use AES-256-GCM with no AAD
//! and a 96-bit nonce counter, one per direction, incremented after every
//! completed exchange. Reordering or replay therefore cannot produce a
//! valid tag.
//!
//! Failures that question the channel itself (tag mismatch, result size not
//! matching the command) tear the session down: keys are forgotten and the
//! nonce counters zeroized.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use zeroize::Zeroize;

use super::crypto::CryptoProvider;
use super::{IntPin, Tropic01, Tropic01Error};

/// Size of the packet length field.
pub(crate) const L3_SIZE_SIZE: usize = 2;
/// Size of the AES-GCM authentication tag.
pub(crate) const L3_TAG_SIZE: usize = 16;
/// Largest command body (id + arguments); the EdDSA sign command with its
/// 4096-byte message bounds it.
pub(crate) const L3_CMD_SIZE_MAX: usize = 4112;
/// Capacity of the packet buffer held in the handle.
pub(crate) const L3_PACKET_MAX_SIZE: usize = L3_SIZE_SIZE + L3_CMD_SIZE_MAX + L3_TAG_SIZE;

/// Secure Session state: the packet buffer, both nonce counters and the
/// session flag. The AES-GCM key contexts live in the crypto provider.
pub(crate) struct SessionState {
    pub(crate) buff: [u8; L3_PACKET_MAX_SIZE],
    pub(crate) enc_iv: [u8; 12],
    pub(crate) dec_iv: [u8; 12],
    pub(crate) active: bool,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            buff: [0; L3_PACKET_MAX_SIZE],
            enc_iv: [0; 12],
            dec_iv: [0; 12],
            active: false,
        }
    }
}

/// Bump a 96-bit little-endian nonce counter.
pub(crate) fn iv_increment(iv: &mut [u8; 12]) {
    for byte in iv.iter_mut() {
        let (v, carry) = byte.overflowing_add(1);
        *byte = v;
        if !carry {
            break;
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
    /// Tear the session down: zeroize nonce counters, forget the AES-GCM
    /// contexts, clear the session flag. Safe to call at any time.
    pub(crate) fn session_invalidate(&mut self) {
        self.session.enc_iv.zeroize();
        self.session.dec_iv.zeroize();
        self.session.active = false;
        self.crypto.wipe();
    }

    /// Whether a Secure Session is currently open.
    pub fn session_active(&self) -> bool {
        self.session.active
    }

    /// Run one full L3 exchange.
    ///
    /// `prefix` is the fixed command header (command id plus fixed arguments),
    /// `data` the variable tail. The command is encrypted in place in the
    /// session buffer, chunked out, and the chip's result pulled back in and
    /// decrypted. Returns the result body length; the body itself (result
    /// byte first) stays in the session buffer, see
    /// [`result_body`](Self::result_body).
    pub(crate) async fn l3_cmd(
        &mut self,
        prefix: &[u8],
        data: &[u8],
    ) -> Result<usize, Tropic01Error> {
        if !self.session.active {
            return Err(Tropic01Error::NoSession);
        }
        let size = prefix.len() + data.len();
        if size == 0 || size > L3_CMD_SIZE_MAX {
            return Err(Tropic01Error::InvalidParam);
        }

        self.session.buff[..L3_SIZE_SIZE].copy_from_slice(&(size as u16).to_le_bytes());
        self.session.buff[L3_SIZE_SIZE..L3_SIZE_SIZE + prefix.len()].copy_from_slice(prefix);
        self.session.buff[L3_SIZE_SIZE + prefix.len()..L3_SIZE_SIZE + size].copy_from_slice(data);

        let iv = self.session.enc_iv;
        let mut tag = [0u8; L3_TAG_SIZE];
        if self
            .crypto
            .aesgcm_encrypt(
                &iv,
                &[],
                &mut self.session.buff[L3_SIZE_SIZE..L3_SIZE_SIZE + size],
                &mut tag,
            )
            .is_err()
        {
            self.session_invalidate();
            return Err(Tropic01Error::CryptoErr);
        }
        self.session.buff[L3_SIZE_SIZE + size..L3_SIZE_SIZE + size + L3_TAG_SIZE]
            .copy_from_slice(&tag);

        self.l2_send_encrypted_cmd(L3_SIZE_SIZE + size + L3_TAG_SIZE)
            .await?;
        let received = self.l2_recv_encrypted_res().await?;

        // result must hold at least the result byte
        if received < L3_SIZE_SIZE + 1 + L3_TAG_SIZE {
            self.session_invalidate();
            return Err(Tropic01Error::RespSize);
        }
        let res_size =
            u16::from_le_bytes([self.session.buff[0], self.session.buff[1]]) as usize;
        if res_size > L3_CMD_SIZE_MAX || L3_SIZE_SIZE + res_size + L3_TAG_SIZE != received {
            self.session_invalidate();
            return Err(Tropic01Error::RespSize);
        }

        let iv = self.session.dec_iv;
        let mut tag = [0u8; L3_TAG_SIZE];
        tag.copy_from_slice(
            &self.session.buff[L3_SIZE_SIZE + res_size..L3_SIZE_SIZE + res_size + L3_TAG_SIZE],
        );
        if self
            .crypto
            .aesgcm_decrypt(
                &iv,
                &[],
                &mut self.session.buff[L3_SIZE_SIZE..L3_SIZE_SIZE + res_size],
                &tag,
            )
            .is_err()
        {
            self.session_invalidate();
            return Err(Tropic01Error::CryptoErr);
        }

        iv_increment(&mut self.session.enc_iv);
        iv_increment(&mut self.session.dec_iv);
        Ok(res_size)
    }

    /// Decrypted result body of the last [`l3_cmd`](Self::l3_cmd) exchange,
    /// result byte first.
    pub(crate) fn result_body(&self, len: usize) -> &[u8] {
        &self.session.buff[L3_SIZE_SIZE..L3_SIZE_SIZE + len]
    }

    /// Result-size invariant shared by every fixed-size command: anything but
    /// the expected body length ends the session.
    pub(crate) fn check_res_size(&mut self, len: usize, expected: usize) -> Result<(), Tropic01Error> {
        if len != expected {
            self.session_invalidate();
            return Err(Tropic01Error::RespSize);
        }
        Ok(())
    }
}
