//! # Host-side cryptography
//!
//! The Secure Session needs a handful of primitives on the host: SHA-256 for
//! the handshake transcript, X25519 for the key agreement, HKDF for the key
//! schedule, AES-256-GCM for packet protection and HMAC-SHA-256 for schemes
//! built on top of the chip (Mac-and-Destroy PIN verification).
//!
//! They are pulled in through the [`CryptoProvider`] trait so that targets
//! with hardware acceleration or a mandated crypto library can plug their own
//! backend. The handle keeps the provider for the lifetime of the session;
//! the two AES-GCM contexts installed with `aesgcm_encrypt_init` /
//! `aesgcm_decrypt_init` live inside it.
//!
//! With the `soft-crypto` feature (default) the pure-Rust [`SoftCrypto`]
//! provider is available, backed by the RustCrypto implementations.

/// Failure inside a crypto primitive. Decryption MUST report this on any
/// authentication-tag mismatch and leave the output unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CryptoError;

/// Cryptographic primitives backing the Secure Session.
pub trait CryptoProvider {
    /// SHA-256 over the concatenation of `parts`.
    fn sha256(&mut self, parts: &[&[u8]]) -> [u8; 32];

    /// HMAC-SHA-256 over the concatenation of `parts`.
    fn hmac_sha256(&mut self, key: &[u8], parts: &[&[u8]]) -> [u8; 32];

    /// HKDF-SHA-256 with salt `ck`, input keying material `ikm`, empty info,
    /// one 32-byte output block.
    fn hkdf(&mut self, ck: &[u8; 32], ikm: &[u8]) -> [u8; 32];

    /// HKDF-SHA-256 as [`hkdf`](Self::hkdf) but expanding two output blocks.
    fn hkdf2(&mut self, ck: &[u8; 32], ikm: &[u8]) -> ([u8; 32], [u8; 32]);

    /// X25519 scalar multiplication of `point` by `secret`.
    fn x25519(&mut self, secret: &[u8; 32], point: &[u8; 32]) -> [u8; 32];

    /// X25519 scalar multiplication of the base point: public key of `secret`.
    fn x25519_base(&mut self, secret: &[u8; 32]) -> [u8; 32];

    /// Install the key of the encryption context.
    fn aesgcm_encrypt_init(&mut self, key: &[u8; 32]);

    /// Install the key of the decryption context.
    fn aesgcm_decrypt_init(&mut self, key: &[u8; 32]);

    /// AES-256-GCM encrypt `data` in place with the encryption context,
    /// writing the authentication tag to `tag`.
    fn aesgcm_encrypt(
        &mut self,
        iv: &[u8; 12],
        aad: &[u8],
        data: &mut [u8],
        tag: &mut [u8; 16],
    ) -> Result<(), CryptoError>;

    /// AES-256-GCM decrypt `data` in place with the decryption context,
    /// verifying `tag`. Fails closed on mismatch.
    fn aesgcm_decrypt(
        &mut self,
        iv: &[u8; 12],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8; 16],
    ) -> Result<(), CryptoError>;

    /// Forget both AES-GCM contexts.
    fn wipe(&mut self);
}

#[cfg(feature = "soft-crypto")]
mod soft {
    use aes_gcm::aead::AeadInPlace;
    use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce, Tag};
    use hkdf::Hkdf;
    use hmac::{Hmac, Mac};
    use sha2::{Digest, Sha256};
    use zeroize::Zeroize;

    use super::{CryptoError, CryptoProvider};

    /// Software [`CryptoProvider`] built on the RustCrypto crates.
    #[derive(Default)]
    pub struct SoftCrypto {
        enc: Option<Aes256Gcm>,
        dec: Option<Aes256Gcm>,
    }

    impl SoftCrypto {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl CryptoProvider for SoftCrypto {
        fn sha256(&mut self, parts: &[&[u8]]) -> [u8; 32] {
            let mut sha = Sha256::new();
            for part in parts {
                sha.update(part);
            }
            sha.finalize().into()
        }

        fn hmac_sha256(&mut self, key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
            let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
                .expect("HMAC accepts any key length");
            for part in parts {
                mac.update(part);
            }
            mac.finalize().into_bytes().into()
        }

        fn hkdf(&mut self, ck: &[u8; 32], ikm: &[u8]) -> [u8; 32] {
            let mut okm = [0u8; 32];
            Hkdf::<Sha256>::new(Some(ck.as_slice()), ikm)
                .expand(&[], &mut okm)
                .expect("32 bytes is a valid HKDF output length");
            okm
        }

        fn hkdf2(&mut self, ck: &[u8; 32], ikm: &[u8]) -> ([u8; 32], [u8; 32]) {
            let mut okm = [0u8; 64];
            Hkdf::<Sha256>::new(Some(ck.as_slice()), ikm)
                .expand(&[], &mut okm)
                .expect("64 bytes is a valid HKDF output length");
            let mut out1 = [0u8; 32];
            let mut out2 = [0u8; 32];
            out1.copy_from_slice(&okm[..32]);
            out2.copy_from_slice(&okm[32..]);
            okm.zeroize();
            (out1, out2)
        }

        fn x25519(&mut self, secret: &[u8; 32], point: &[u8; 32]) -> [u8; 32] {
            x25519_dalek::x25519(*secret, *point)
        }

        fn x25519_base(&mut self, secret: &[u8; 32]) -> [u8; 32] {
            x25519_dalek::x25519(*secret, x25519_dalek::X25519_BASEPOINT_BYTES)
        }

        fn aesgcm_encrypt_init(&mut self, key: &[u8; 32]) {
            self.enc = Some(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)));
        }

        fn aesgcm_decrypt_init(&mut self, key: &[u8; 32]) {
            self.dec = Some(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)));
        }

        fn aesgcm_encrypt(
            &mut self,
            iv: &[u8; 12],
            aad: &[u8],
            data: &mut [u8],
            tag: &mut [u8; 16],
        ) -> Result<(), CryptoError> {
            let ctx = self.enc.as_ref().ok_or(CryptoError)?;
            let t = ctx
                .encrypt_in_place_detached(Nonce::from_slice(iv), aad, data)
                .map_err(|_| CryptoError)?;
            tag.copy_from_slice(&t);
            Ok(())
        }

        fn aesgcm_decrypt(
            &mut self,
            iv: &[u8; 12],
            aad: &[u8],
            data: &mut [u8],
            tag: &[u8; 16],
        ) -> Result<(), CryptoError> {
            let ctx = self.dec.as_ref().ok_or(CryptoError)?;
            ctx.decrypt_in_place_detached(Nonce::from_slice(iv), aad, data, Tag::from_slice(tag))
                .map_err(|_| CryptoError)
        }

        fn wipe(&mut self) {
            self.enc = None;
            self.dec = None;
        }
    }
}

#[cfg(feature = "soft-crypto")]
pub use soft::SoftCrypto;
