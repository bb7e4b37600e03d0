//! # Secure Session management
//!
//! The Secure Session is established with the Noise_KK1_25519_AESGCM_SHA256
//! pattern. Both sides know each other's static X25519 public key up front:
//! the host's pairing public key `SHiPUB` sits in one of four slots on the
//! chip, the chip's static key `STPUB` is carried in its certificate.
//!
//! The handshake is a single L2 round trip. The host sends a fresh ephemeral
//! public key and the pairing slot index; the chip answers with its own
//! ephemeral key and an authentication tag over the transcript hash. Three
//! X25519 agreements feed an HKDF chain that yields the tag-check key and the
//! two directional AES-256-GCM session keys.
//!
//! All intermediate secrets live in [`Zeroizing`] buffers; whichever path the
//! handshake takes, they are wiped when it returns.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::crypto::CryptoProvider;
use super::l2::{L2_HANDSHAKE_REQ_ID, L2_SESSION_ABT_REQ_ID};
use super::{IntPin, Tropic01, Tropic01Error};

pub use super::cmd::cmd_pairing::PairingKeySlot;

/// Noise protocol name, zero-padded to one SHA-256 block of transcript.
const PROTOCOL_NAME: [u8; 32] = *b"Noise_KK1_25519_AESGCM_SHA256\x00\x00\x00";

/// Host ephemeral X25519 public key length.
const EHPUB_LEN: usize = 32;
/// Chip ephemeral X25519 public key length.
const ETPUB_LEN: usize = 32;
/// Handshake authentication tag length.
const AUTH_TAG_LEN: usize = 16;

impl<O, SPI, M, C> Tropic01<O, SPI, M, C>
where
    O: OutputPin,
    SPI: SpiBus<u8>,
    M: IntPin,
    C: CryptoProvider,
{
    /// Open a Secure Session.
    ///
    /// `stpub` is the chip's static public key (see
    /// [`get_st_pub`](crate::cmd::cmd_info::get_st_pub)), `pkey_index` selects
    /// the pairing slot holding `shipub`, and `shipriv`/`shipub` are the
    /// host's long-term pairing keypair. `rng` feeds the ephemeral key.
    ///
    /// Any previously open session is torn down first, whether or not the
    /// handshake then succeeds.
    pub async fn session_start<R>(
        &mut self,
        rng: &mut R,
        stpub: &[u8; 32],
        pkey_index: PairingKeySlot,
        shipriv: &[u8; 32],
        shipub: &[u8; 32],
    ) -> Result<(), Tropic01Error>
    where
        R: RngCore + CryptoRng,
    {
        self.session_invalidate();

        let mut ehpriv = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(ehpriv.as_mut());
        let ehpub = self.crypto.x25519_base(&ehpriv);

        let mut payload = [0u8; EHPUB_LEN + 1];
        payload[..EHPUB_LEN].copy_from_slice(&ehpub);
        payload[EHPUB_LEN] = pkey_index as u8;
        let rsp_len = self.l2_request(L2_HANDSHAKE_REQ_ID, &payload).await?;
        if rsp_len != ETPUB_LEN + AUTH_TAG_LEN {
            return Err(Tropic01Error::RespSize);
        }
        let mut etpub = [0u8; ETPUB_LEN];
        etpub.copy_from_slice(&self.l2buf.rsp_data()[..ETPUB_LEN]);
        let mut auth_tag = [0u8; AUTH_TAG_LEN];
        auth_tag.copy_from_slice(&self.l2buf.rsp_data()[ETPUB_LEN..ETPUB_LEN + AUTH_TAG_LEN]);

        // Transcript hash: protocol name, both static keys, host ephemeral,
        // pairing slot index, chip ephemeral. Order is fixed by the pattern.
        let h = self.crypto.sha256(&[&PROTOCOL_NAME]);
        let h = self.crypto.sha256(&[&h, shipub]);
        let h = self.crypto.sha256(&[&h, stpub]);
        let h = self.crypto.sha256(&[&h, &ehpub]);
        let h = self.crypto.sha256(&[&h, &[pkey_index as u8]]);
        let h = self.crypto.sha256(&[&h, &etpub]);

        // ck = protocol name
        // ck         = HKDF(ck, X25519(EHPRIV, ETPUB))
        // ck         = HKDF(ck, X25519(SHiPRIV, ETPUB))
        // ck, kAUTH  = HKDF(ck, X25519(EHPRIV, STPUB))
        // kCMD, kRES = HKDF(ck, "")
        let dh = Zeroizing::new(self.crypto.x25519(&ehpriv, &etpub));
        let ck = Zeroizing::new(self.crypto.hkdf(&PROTOCOL_NAME, dh.as_ref()));
        let dh = Zeroizing::new(self.crypto.x25519(shipriv, &etpub));
        let ck = Zeroizing::new(self.crypto.hkdf(&ck, dh.as_ref()));
        let dh = Zeroizing::new(self.crypto.x25519(&ehpriv, stpub));
        let (ck, kauth) = self.crypto.hkdf2(&ck, dh.as_ref());
        let ck = Zeroizing::new(ck);
        let kauth = Zeroizing::new(kauth);
        let (kcmd, kres) = self.crypto.hkdf2(&ck, &[]);
        let kcmd = Zeroizing::new(kcmd);
        let kres = Zeroizing::new(kres);

        // The chip proves key possession with a tag over the transcript.
        self.crypto.aesgcm_decrypt_init(&kauth);
        let zero_iv = [0u8; 12];
        if self
            .crypto
            .aesgcm_decrypt(&zero_iv, &h, &mut [], &auth_tag)
            .is_err()
        {
            self.session_invalidate();
            return Err(Tropic01Error::CryptoErr);
        }

        self.crypto.aesgcm_encrypt_init(&kcmd);
        self.crypto.aesgcm_decrypt_init(&kres);
        self.session.active = true;
        Ok(())
    }

    /// Abort the Secure Session on the chip and locally.
    ///
    /// Local key material is zeroized no matter how the chip answers.
    /// Aborting without an open session is fine and reports success.
    pub async fn session_abort(&mut self) -> Result<(), Tropic01Error> {
        let ret = self.l2_request(L2_SESSION_ABT_REQ_ID, &[]).await;
        self.session_invalidate();
        ret.map(|_| ())
    }

    /// Read the certificate store, slice the chip's static public key out of
    /// the device certificate and open a session with it.
    ///
    /// `cert_buf` is scratch for the certificate store; 3840 bytes fit any
    /// store the chip can hold.
    pub async fn verify_chip_and_start_secure_session<R>(
        &mut self,
        rng: &mut R,
        pkey_index: PairingKeySlot,
        shipriv: &[u8; 32],
        shipub: &[u8; 32],
        cert_buf: &mut [u8],
    ) -> Result<(), Tropic01Error>
    where
        R: RngCore + CryptoRng,
    {
        let store = self.get_info_cert_store(cert_buf).await?;
        let device_cert = store
            .cert(cert_buf, 0)
            .ok_or(Tropic01Error::InvalidParam)?;
        let stpub = super::cmd::cmd_info::get_st_pub(device_cert).ok_or(Tropic01Error::Fail)?;
        self.session_start(rng, &stpub, pkey_index, shipriv, shipub)
            .await
    }
}
