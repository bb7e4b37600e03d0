//! # TROPIC01 secure element driver
//!
//! Async driver for the Tropic Square TROPIC01 secure element, connected over SPI.
//! The device exposes its functionality behind a three-layer protocol:
//!
//! - **L1**: raw SPI framing with a chip-status probe, busy polling and an optional
//!   interrupt pin signalling that a response is ready.
//! - **L2**: request/response frames protected by CRC-16, carrying device queries
//!   (chip identity, certificate store, firmware versions) and the chunked stream
//!   of encrypted command packets.
//! - **L3**: the Secure Session. A Noise_KK1_25519_AESGCM_SHA256 handshake derives
//!   per-direction AES-256-GCM keys; every command and result travels encrypted
//!   with monotonically increasing nonces.
//!
//! The driver owns the chip-select pin and the SPI bus, plus an implementation of
//! [`IntPin`] for response signalling and a [`CryptoProvider`](crypto::CryptoProvider)
//! for the host-side primitives. With the default `soft-crypto` feature a pure
//! software provider ([`SoftCrypto`](crypto::SoftCrypto)) is available.
//!
//! ## Typical flow
//!
//! 1. [`Tropic01::new`] with bus, pins and crypto provider
//! 2. [`init`](Tropic01::init) to probe the firmware version and fill device attributes
//! 3. [`session_start`](Tropic01::session_start) (or
//!    [`verify_chip_and_start_secure_session`](Tropic01::verify_chip_and_start_secure_session))
//! 4. any number of L3 commands: [`ping`](Tropic01::ping),
//!    [`ecc_key_generate`](Tropic01::ecc_key_generate),
//!    [`eddsa_sign`](Tropic01::eddsa_sign), [`mcounter_update`](Tropic01::mcounter_update), ...
//! 5. [`session_abort`](Tropic01::session_abort), [`deinit`](Tropic01::deinit)
//!
//! One driver instance talks to one chip and must not be shared between tasks;
//! all requests on it are strictly ordered.

#![no_std]

use embassy_time::{Duration, Timer, with_timeout};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiBus;

pub mod cmd;
pub mod config;
pub mod crypto;
pub mod ecc;
pub mod macandd;
pub mod mcounter;
pub mod mem;
pub mod pairing;
pub mod session;
pub mod status;
pub mod system;
pub mod util;

pub(crate) mod l2;
pub(crate) mod l3;

use crypto::CryptoProvider;
use l3::SessionState;
use status::ChipStatus;
use system::Tr01Attrs;

/// First MOSI byte of a response read: asks the chip for its status byte
/// and, when ready, the pending L2 response.
pub(crate) const GET_RESPONSE_REQ_ID: u8 = 0xAA;

/// Number of chip-status probes before a read gives up with [`Tropic01Error::ChipBusy`].
pub const L1_READ_MAX_TRIES: u32 = 50;

/// Pause between two chip-status probes when no interrupt pin is available.
pub const L1_READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Shortest accepted SPI transfer/probe timeout.
pub const L1_TIMEOUT_MIN: Duration = Duration::from_millis(5);
/// Longest accepted SPI transfer/probe timeout.
pub const L1_TIMEOUT_MAX: Duration = Duration::from_millis(150);
/// Default SPI transfer/probe timeout.
pub const L1_TIMEOUT_DEFAULT: Duration = Duration::from_millis(70);

/// Largest L2 frame read from the chip:
/// chip_status + status + rsp_len + 252 B payload + CRC-16.
pub(crate) const L2_MAX_FRAME_SIZE: usize = 257;

/// Errors reported by the driver.
///
/// The first group covers argument and session-state misuse, the next two the
/// transport layers, then the result codes reported by the chip inside an
/// encrypted command result, and finally host-side crypto failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tropic01Error {
    /// An argument is out of range (slot index, buffer length, timeout, ...)
    InvalidParam,
    /// The operation needs a Secure Session but none is open
    NoSession,

    /// SPI bus transfer failed
    Spi,
    /// Chip select or interrupt pin error
    Pin,
    /// No rising edge on the interrupt pin within the timeout
    IntTimeout,
    /// Chip still busy after the maximum number of status probes
    ChipBusy,
    /// Chip signals alarm mode. Fatal; the chip refuses further operation
    AlarmMode,
    /// Length field of an incoming frame exceeds the transport buffer
    DataLen,

    /// CRC-16 mismatch on a received L2 frame
    InCrc,
    /// Chip could not verify the handshake request
    HskErr,
    /// Chip has no open session for an encrypted command
    SessionErr,
    /// Chip rejected the packet authentication tag
    TagErr,
    /// Chip saw a CRC error in our request (it may be resent)
    CrcErr,
    /// Request id unknown to the chip
    UnknownReq,
    /// Generic L2 failure
    GenErr,
    /// Interface disabled by configuration
    DisabledErr,
    /// Truncated-MAC error reported by the chip
    TmacErr,
    /// L2 status byte with no known meaning; raw value attached
    StatusUnknown(u8),

    /// Command failed on the chip
    Fail,
    /// Access not allowed for the current pairing key
    Unauthorized,
    /// Command id unknown to the firmware
    InvalidCmd,
    /// Hardware fault reported by the chip
    HardwareFail,
    /// ECC slot does not hold a usable key
    InvalidKey,
    /// Slot holds no data
    SlotEmpty,
    /// Pairing key slot was invalidated
    SlotInvalid,
    /// Slot already holds data; erase it first
    SlotNotEmpty,
    /// R-memory slot exceeded its lifetime
    SlotExpired,
    /// Monotonic counter is already at zero
    UpdateErr,
    /// Monotonic counter was never initialized
    CounterInvalid,
    /// Wrong PIN entered, or no PIN attempts left
    PinFail,
    /// Result byte with no known meaning; raw value attached
    ResultUnknown(u8),

    /// AEAD or key-derivation primitive failed (tag mismatch included)
    CryptoErr,
    /// Result size does not match the fixed size expected for the command
    RespSize,
}

impl Tropic01Error {
    /// Human readable name, for hosts without `defmt`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tropic01Error::InvalidParam => "invalid parameter",
            Tropic01Error::NoSession => "no secure session open",
            Tropic01Error::Spi => "SPI transfer failed",
            Tropic01Error::Pin => "pin error",
            Tropic01Error::IntTimeout => "interrupt pin timeout",
            Tropic01Error::ChipBusy => "chip busy",
            Tropic01Error::AlarmMode => "chip in alarm mode",
            Tropic01Error::DataLen => "frame length out of bounds",
            Tropic01Error::InCrc => "bad CRC in received frame",
            Tropic01Error::HskErr => "handshake rejected",
            Tropic01Error::SessionErr => "chip has no session",
            Tropic01Error::TagErr => "chip rejected packet tag",
            Tropic01Error::CrcErr => "chip saw bad request CRC",
            Tropic01Error::UnknownReq => "unknown request",
            Tropic01Error::GenErr => "generic L2 error",
            Tropic01Error::DisabledErr => "interface disabled",
            Tropic01Error::TmacErr => "truncated MAC error",
            Tropic01Error::StatusUnknown(_) => "unrecognized L2 status",
            Tropic01Error::Fail => "command failed",
            Tropic01Error::Unauthorized => "unauthorized",
            Tropic01Error::InvalidCmd => "invalid command",
            Tropic01Error::HardwareFail => "hardware fault",
            Tropic01Error::InvalidKey => "no usable key in slot",
            Tropic01Error::SlotEmpty => "slot empty",
            Tropic01Error::SlotInvalid => "slot invalidated",
            Tropic01Error::SlotNotEmpty => "slot not empty",
            Tropic01Error::SlotExpired => "slot expired",
            Tropic01Error::UpdateErr => "counter already at zero",
            Tropic01Error::CounterInvalid => "counter not initialized",
            Tropic01Error::PinFail => "PIN check failed",
            Tropic01Error::ResultUnknown(_) => "unrecognized result code",
            Tropic01Error::CryptoErr => "crypto failure",
            Tropic01Error::RespSize => "unexpected result size",
        }
    }
}

/// Response-ready signalling used between a request write and the response read.
///
/// When the INT pin of the TROPIC01 is wired, wrap it in [`Int`]: the driver
/// then blocks on its rising edge instead of polling. Use [`NoIntPin`]
/// otherwise; the driver falls back to delayed status polling.
#[allow(async_fn_in_trait)]
pub trait IntPin {
    /// Wait until the chip may have a response, or fail with a timeout.
    async fn wait_response(&mut self, timeout: Duration) -> Result<(), Tropic01Error>;
}

/// Polling fallback for boards that leave the INT pin unconnected.
pub struct NoIntPin;

impl IntPin for NoIntPin {
    async fn wait_response(&mut self, _timeout: Duration) -> Result<(), Tropic01Error> {
        Timer::after(L1_READ_RETRY_DELAY).await;
        Ok(())
    }
}

/// Wired INT pin. The chip raises it once an L2 response is ready.
pub struct Int<P>(pub P);

impl<P: Wait> IntPin for Int<P> {
    async fn wait_response(&mut self, timeout: Duration) -> Result<(), Tropic01Error> {
        match with_timeout(timeout, self.0.wait_for_rising_edge()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Tropic01Error::Pin),
            Err(_) => Err(Tropic01Error::IntTimeout),
        }
    }
}

/// Construction-time options.
#[derive(Clone, Debug)]
pub struct Config {
    /// Timeout of one SPI transfer / chip-status probe.
    /// Valid range is [`L1_TIMEOUT_MIN`]..=[`L1_TIMEOUT_MAX`].
    pub timeout: Duration,
    /// Retry a response once via `Resend_Req` when its CRC does not check out.
    pub crc_resend: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: L1_TIMEOUT_DEFAULT,
            crc_resend: true,
        }
    }
}

/// Transport buffer holding one L2 frame, laid out as read from the wire:
/// `[chip_status, status, rsp_len, data.., crc_hi, crc_lo]`.
pub(crate) struct FrameBuf(pub(crate) [u8; L2_MAX_FRAME_SIZE]);

impl FrameBuf {
    pub(crate) fn chip_status(&self) -> ChipStatus {
        self.0[0].into()
    }

    /// L2 status byte of a received response.
    pub(crate) fn status(&self) -> u8 {
        self.0[1]
    }

    /// Payload length byte of a received response.
    pub(crate) fn rsp_len(&self) -> usize {
        self.0[2] as usize
    }

    /// Payload of a received response.
    pub(crate) fn rsp_data(&self) -> &[u8] {
        &self.0[3..3 + self.rsp_len()]
    }
}

/// TROPIC01 driver handle.
///
/// `O` is the chip select output, `SPI` the bus, `M` the response signalling
/// ([`Int`] or [`NoIntPin`]) and `C` the host crypto provider.
pub struct Tropic01<O, SPI, M, C> {
    pub(crate) nss: O,
    pub(crate) spi: SPI,
    pub(crate) int: M,
    pub(crate) crypto: C,
    pub(crate) cfg: Config,
    pub(crate) l2buf: FrameBuf,
    pub(crate) session: SessionState,
    pub(crate) attrs: Tr01Attrs,
}

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Create a driver from its bus, pins and crypto provider.
    ///
    /// Returns [`Tropic01Error::InvalidParam`] when the configured timeout is
    /// outside [`L1_TIMEOUT_MIN`]..=[`L1_TIMEOUT_MAX`].
    pub fn new(spi: SPI, nss: O, int: M, crypto: C, cfg: Config) -> Result<Self, Tropic01Error> {
        if cfg.timeout < L1_TIMEOUT_MIN || cfg.timeout > L1_TIMEOUT_MAX {
            return Err(Tropic01Error::InvalidParam);
        }
        Ok(Self {
            nss,
            spi,
            int,
            crypto,
            cfg,
            l2buf: FrameBuf([0; L2_MAX_FRAME_SIZE]),
            session: SessionState::new(),
            attrs: Tr01Attrs::default(),
        })
    }

    /// Probe the chip and fill the device attribute table.
    ///
    /// Reads the RISC-V firmware version over L2 and derives the limits that
    /// depend on it, currently the maximum user-memory slot payload.
    pub async fn init(&mut self) -> Result<(), Tropic01Error> {
        let ver = self.get_info_riscv_fw_ver().await?;
        self.attrs = Tr01Attrs::from_riscv_fw_ver(ver);
        Ok(())
    }

    /// Drop all session material. Keys and nonce counters are zeroized even
    /// when a previous transport operation failed.
    pub async fn deinit(&mut self) -> Result<(), Tropic01Error> {
        self.session_invalidate();
        Ok(())
    }

    /// Device attributes filled by [`init`](Self::init).
    pub fn attrs(&self) -> &Tr01Attrs {
        &self.attrs
    }

    /// Single chip-status probe: one `Get_Response` byte with nothing read after it.
    pub(crate) async fn l1_probe(&mut self) -> Result<ChipStatus, Tropic01Error> {
        self.nss.set_low().map_err(|_| Tropic01Error::Pin)?;
        let mut probe = [GET_RESPONSE_REQ_ID];
        let ret = self.spi.transfer_in_place(&mut probe).await;
        self.nss.set_high().map_err(|_| Tropic01Error::Pin)?;
        ret.map_err(|_| Tropic01Error::Spi)?;
        Ok(probe[0].into())
    }

    /// Write one L2 request frame (already serialized into the transport buffer).
    pub(crate) async fn l1_write(&mut self, len: usize) -> Result<(), Tropic01Error> {
        self.nss.set_low().map_err(|_| Tropic01Error::Pin)?;
        let ret = self.spi.transfer_in_place(&mut self.l2buf.0[..len]).await;
        self.nss.set_high().map_err(|_| Tropic01Error::Pin)?;
        ret.map_err(|_| Tropic01Error::Spi)
    }

    /// Read one L2 response frame into the transport buffer.
    ///
    /// Polls the chip-status byte until the chip is ready, then pulls the
    /// status, length, payload and CRC. While the chip reports startup mode
    /// the INT pin is not driven, so plain delays are used there.
    pub(crate) async fn l1_read(&mut self) -> Result<(), Tropic01Error> {
        for _ in 0..L1_READ_MAX_TRIES {
            self.nss.set_low().map_err(|_| Tropic01Error::Pin)?;
            self.l2buf.0[0] = GET_RESPONSE_REQ_ID;
            if self
                .spi
                .transfer_in_place(&mut self.l2buf.0[..1])
                .await
                .is_err()
            {
                let _ = self.nss.set_high();
                return Err(Tropic01Error::Spi);
            }

            let chip_status = self.l2buf.chip_status();
            if chip_status.alarm() {
                let _ = self.nss.set_high();
                return Err(Tropic01Error::AlarmMode);
            }

            if chip_status.ready() {
                // Status byte and length byte follow immediately.
                if self
                    .spi
                    .transfer_in_place(&mut self.l2buf.0[1..3])
                    .await
                    .is_err()
                {
                    let _ = self.nss.set_high();
                    return Err(Tropic01Error::Spi);
                }

                // 0xFF in the status slot: nothing to send yet, try again.
                if self.l2buf.status() == 0xFF {
                    self.nss.set_high().map_err(|_| Tropic01Error::Pin)?;
                    Timer::after(L1_READ_RETRY_DELAY).await;
                    continue;
                }

                // Remaining bytes: payload plus two CRC bytes.
                let tail = self.l2buf.rsp_len() + 2;
                if 3 + tail > L2_MAX_FRAME_SIZE {
                    let _ = self.nss.set_high();
                    return Err(Tropic01Error::DataLen);
                }
                if self
                    .spi
                    .transfer_in_place(&mut self.l2buf.0[3..3 + tail])
                    .await
                    .is_err()
                {
                    let _ = self.nss.set_high();
                    return Err(Tropic01Error::Spi);
                }
                self.nss.set_high().map_err(|_| Tropic01Error::Pin)?;
                return Ok(());
            }

            self.nss.set_high().map_err(|_| Tropic01Error::Pin)?;
            if chip_status.startup() {
                // INT pin is not driven in startup mode.
                Timer::after(L1_READ_RETRY_DELAY).await;
            } else {
                let timeout = self.cfg.timeout;
                self.int.wait_response(timeout).await?;
            }
        }
        Err(Tropic01Error::ChipBusy)
    }

    /// Poll the chip-status byte until the READY bit appears.
    ///
    /// Useful after a reboot request, before talking to the chip again.
    pub async fn wait_chip_ready(&mut self) -> Result<(), Tropic01Error> {
        for _ in 0..L1_READ_MAX_TRIES {
            let status = self.l1_probe().await?;
            if status.alarm() {
                return Err(Tropic01Error::AlarmMode);
            }
            if status.ready() {
                return Ok(());
            }
            Timer::after(L1_READ_RETRY_DELAY).await;
        }
        Err(Tropic01Error::ChipBusy)
    }
}
