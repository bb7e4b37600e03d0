//! # L2 request/response transport
//!
//! An L2 request frame is `[id, len, payload, crc16]`, a response (as read
//! from the wire, chip-status byte first) `[chip_status, status, rsp_len,
//! payload, crc16]`. The CRC is the reflected 0x8005 polynomial with zero
//! init, transmitted high byte first, and covers everything between the
//! chip-status byte and itself.
//!
//! Besides the plain one-frame queries this layer carries the chunked stream
//! of encrypted command packets: up to 252 payload bytes per chunk, the chip
//! acknowledging intermediate chunks with `REQUEST_CONT`/`RESULT_CONT`.
//!
//! A response whose CRC does not verify can be recovered once by asking the
//! chip to resend its last response; the retry is on by default and can be
//! switched off in [`Config`](crate::Config).

use crc::{CRC_16_ARC, Crc};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;

use super::crypto::CryptoProvider;
use super::l3::L3_PACKET_MAX_SIZE;
use super::status::L2Status;
use super::{FrameBuf, IntPin, Tropic01, Tropic01Error};

pub(crate) const L2_GET_INFO_REQ_ID: u8 = 0x01;
pub(crate) const L2_HANDSHAKE_REQ_ID: u8 = 0x02;
pub(crate) const L2_ENCRYPTED_CMD_REQ_ID: u8 = 0x04;
pub(crate) const L2_ENCRYPTED_CMD_NEXT_ID: u8 = 0x05;
pub(crate) const L2_ENCRYPTED_CMD_RES_ID: u8 = 0x06;
pub(crate) const L2_ENCRYPTED_CMD_RES_NEXT_ID: u8 = 0x07;
pub(crate) const L2_SESSION_ABT_REQ_ID: u8 = 0x08;
pub(crate) const L2_RESEND_REQ_ID: u8 = 0x10;
pub(crate) const L2_SLEEP_REQ_ID: u8 = 0x20;
pub(crate) const L2_GET_LOG_REQ_ID: u8 = 0xA2;
pub(crate) const L2_MUTABLE_FW_UPDATE_REQ_ID: u8 = 0xB1;
pub(crate) const L2_MUTABLE_FW_UPDATE_DATA_ID: u8 = 0xB2;
pub(crate) const L2_STARTUP_REQ_ID: u8 = 0xB3;

/// Payload capacity of one L2 frame.
pub(crate) const L2_CHUNK_MAX_DATA_SIZE: usize = 252;

/// CRC-16 of the L2 framing: polynomial 0x8005 reflected, init 0x0000,
/// no final XOR, bytes processed LSB first.
pub(crate) const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

impl FrameBuf {
    /// Serialize a request frame. Returns the number of bytes to clock out.
    pub(crate) fn encode_request(&mut self, id: u8, payload: &[u8]) -> usize {
        let n = payload.len();
        self.0[0] = id;
        self.0[1] = n as u8;
        self.0[2..2 + n].copy_from_slice(payload);
        let crc = CRC16.checksum(&self.0[..2 + n]);
        self.0[2 + n..4 + n].copy_from_slice(&crc.to_be_bytes());
        4 + n
    }

    /// Verify the CRC of a received response (status, length and payload are
    /// covered; the chip-status byte is not).
    pub(crate) fn check_response_crc(&self) -> bool {
        let n = 2 + self.rsp_len();
        let want = u16::from_be_bytes([self.0[1 + n], self.0[2 + n]]);
        CRC16.checksum(&self.0[1..1 + n]) == want
    }
}

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Read one response frame, retrying once through `Resend_Req` when the
    /// CRC does not verify and the retry is enabled.
    async fn l2_read_response(&mut self) -> Result<L2Status, Tropic01Error> {
        self.l1_read().await?;
        if !self.l2buf.check_response_crc() {
            if !self.cfg.crc_resend {
                return Err(Tropic01Error::InCrc);
            }
            let len = self.l2buf.encode_request(L2_RESEND_REQ_ID, &[]);
            self.l1_write(len).await?;
            self.l1_read().await?;
            if !self.l2buf.check_response_crc() {
                return Err(Tropic01Error::InCrc);
            }
        }
        Ok(L2Status::from(self.l2buf.status()))
    }

    /// One L2 round trip: write a request, read its response, classify it.
    pub(crate) async fn l2_transfer(
        &mut self,
        id: u8,
        payload: &[u8],
    ) -> Result<L2Status, Tropic01Error> {
        let len = self.l2buf.encode_request(id, payload);
        self.l1_write(len).await?;
        self.l2_read_response().await
    }

    /// L2 request expecting a single complete response frame.
    /// Returns the response payload length, payload left in the frame buffer.
    pub(crate) async fn l2_request(
        &mut self,
        id: u8,
        payload: &[u8],
    ) -> Result<usize, Tropic01Error> {
        let status = self.l2_transfer(id, payload).await?;
        status.check()?;
        match status {
            L2Status::RequestOk | L2Status::ResultOk | L2Status::SleepOk => {
                Ok(self.l2buf.rsp_len())
            }
            // a CONT here means the caller used the wrong entry point
            _ => Err(Tropic01Error::StatusUnknown(self.l2buf.status())),
        }
    }

    /// Ship `total` bytes of encrypted packet from the session buffer,
    /// chunk by chunk. The chip acknowledges every chunk before the next
    /// one goes out and the terminal chunk with `REQUEST_OK`.
    pub(crate) async fn l2_send_encrypted_cmd(&mut self, total: usize) -> Result<(), Tropic01Error> {
        let mut offset = 0;
        let mut id = L2_ENCRYPTED_CMD_REQ_ID;
        while offset < total {
            let n = core::cmp::min(L2_CHUNK_MAX_DATA_SIZE, total - offset);
            let len = self
                .l2buf
                .encode_request(id, &self.session.buff[offset..offset + n]);
            self.l1_write(len).await?;
            let status = self.l2_read_response().await?;
            status.check()?;
            offset += n;
            match status {
                L2Status::RequestCont if offset < total => {}
                L2Status::RequestOk if offset == total => {}
                _ => return Err(Tropic01Error::StatusUnknown(self.l2buf.status())),
            }
            id = L2_ENCRYPTED_CMD_NEXT_ID;
        }
        Ok(())
    }

    /// Pull encrypted-result chunks into the session buffer until the chip
    /// reports `RESULT_OK`. Returns the assembled packet length.
    pub(crate) async fn l2_recv_encrypted_res(&mut self) -> Result<usize, Tropic01Error> {
        let mut total = 0;
        let mut id = L2_ENCRYPTED_CMD_RES_ID;
        loop {
            let status = self.l2_transfer(id, &[]).await?;
            status.check()?;
            let n = self.l2buf.rsp_len();
            if total + n > L3_PACKET_MAX_SIZE {
                return Err(Tropic01Error::DataLen);
            }
            self.session.buff[total..total + n].copy_from_slice(self.l2buf.rsp_data());
            total += n;
            match status {
                L2Status::ResultCont => id = L2_ENCRYPTED_CMD_RES_NEXT_ID,
                L2Status::ResultOk => return Ok(total),
                _ => return Err(Tropic01Error::StatusUnknown(self.l2buf.status())),
            }
        }
    }
}
