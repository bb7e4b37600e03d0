//! Software model of a TROPIC01 used by the integration tests.
//!
//! The model implements the chip side of all three protocol layers: the
//! chip-status probe handshake, L2 framing with CRC, the Noise_KK1 handshake
//! and the encrypted command stream, plus enough application state (pairing
//! keys, user memory, ECC slots, counters, Mac-and-Destroy slots) to exercise
//! every driver command for real. Knobs on [`Model`] inject the fault modes
//! the driver must survive: busy chips, alarm mode, CRC corruption and forced
//! result codes.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use crc::{CRC_16_ARC, Crc};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use tropic01::crypto::{CryptoProvider, SoftCrypto};
use tropic01::{Config, NoIntPin, Tropic01};

pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

const PROTOCOL_NAME: [u8; 32] = *b"Noise_KK1_25519_AESGCM_SHA256\x00\x00\x00";

const STATUS_REQUEST_OK: u8 = 0x01;
const STATUS_RESULT_OK: u8 = 0x02;
const STATUS_REQUEST_CONT: u8 = 0x03;
const STATUS_RESULT_CONT: u8 = 0x04;
const STATUS_HSK_ERR: u8 = 0x79;
const STATUS_NO_SESSION: u8 = 0x7A;
const STATUS_TAG_ERR: u8 = 0x7B;
const STATUS_CRC_ERR: u8 = 0x7C;
const STATUS_GEN_ERR: u8 = 0x7F;
const STATUS_SLEEP_OK: u8 = 0x82;

const RESULT_OK: u8 = 0xC3;
const RESULT_FAIL: u8 = 0x3C;

#[derive(Clone, Copy, PartialEq)]
enum PairingSlotState {
    Empty,
    Written([u8; 32]),
    Invalid,
}

struct EccSlot {
    curve: u8,
    origin: u8,
    seed: [u8; 32],
    pubkey: Vec<u8>,
}

struct DevSession {
    crypto: SoftCrypto,
    cmd_iv: [u8; 12],
    res_iv: [u8; 12],
}

fn iv_bump(iv: &mut [u8; 12]) {
    for b in iv.iter_mut() {
        let (v, c) = b.overflowing_add(1);
        *b = v;
        if !c {
            break;
        }
    }
}

pub struct ModelState {
    // transport
    csn_low: bool,
    first_mosi: Option<u8>,
    mosi: Vec<u8>,
    miso: VecDeque<u8>,
    pending: VecDeque<Vec<u8>>,
    last_response: Option<Vec<u8>>,

    // fault injection
    pub busy_probes: u32,
    pub alarm: bool,
    pub corrupt_next_crc: bool,
    pub force_result: Option<u8>,

    // identity
    startup_mode: bool,
    riscv_fw_ver: [u8; 4],
    spect_fw_ver: [u8; 4],
    chip_id: [u8; 128],
    cert_image: Vec<u8>,
    stpriv: [u8; 32],

    // session
    session: Option<DevSession>,
    l3_rx: Vec<u8>,
    l3_tx: VecDeque<(u8, Vec<u8>)>,

    // application state
    pairing: [PairingSlotState; 4],
    r_config: HashMap<u16, u32>,
    i_config: HashMap<u16, u32>,
    r_mem: HashMap<u16, Vec<u8>>,
    ecc: HashMap<u16, EccSlot>,
    mcounter: HashMap<u16, u32>,
    macandd: HashMap<u16, [u8; 32]>,
    log: VecDeque<Vec<u8>>,
    pub fw_received: usize,

    crypto: SoftCrypto,
    rng: StdRng,
}

/// Host-side keys matching the model's provisioning.
#[derive(Clone, Copy)]
pub struct TestKeys {
    pub stpub: [u8; 32],
    pub shipriv: [u8; 32],
    pub shipub: [u8; 32],
}

impl ModelState {
    fn new(riscv_fw_ver: [u8; 4]) -> (Self, TestKeys) {
        let mut crypto = SoftCrypto::new();
        let stpriv = [5u8; 32];
        let stpub = crypto.x25519_base(&stpriv);
        let shipriv = [7u8; 32];
        let shipub = crypto.x25519_base(&shipriv);

        let mut chip_id = [0u8; 128];
        chip_id[0] = 1;
        chip_id[28..32].copy_from_slice(b"ACAB");
        for (i, b) in chip_id[112..128].iter_mut().enumerate() {
            *b = 0xC0 + i as u8;
        }

        // store image: header, device certificate with the STPUB marker, one
        // trailing certificate
        let mut cert0 = vec![0x30u8; 300];
        cert0[100..105].copy_from_slice(&[0x65, 0x6E, 0x03, 0x21, 0x00]);
        cert0[105..137].copy_from_slice(&stpub);
        let cert1 = vec![0x31u8; 80];
        let mut cert_image = vec![0u8; 10];
        cert_image[0] = 1;
        cert_image[1] = 2;
        cert_image[2..4].copy_from_slice(&(cert0.len() as u16).to_be_bytes());
        cert_image[4..6].copy_from_slice(&(cert1.len() as u16).to_be_bytes());
        cert_image.extend_from_slice(&cert0);
        cert_image.extend_from_slice(&cert1);

        let mut log = VecDeque::new();
        log.push_back(b"boot ok".to_vec());

        let state = ModelState {
            csn_low: false,
            first_mosi: None,
            mosi: Vec::new(),
            miso: VecDeque::new(),
            pending: VecDeque::new(),
            last_response: None,
            busy_probes: 0,
            alarm: false,
            corrupt_next_crc: false,
            force_result: None,
            startup_mode: false,
            riscv_fw_ver,
            spect_fw_ver: [0x00, 0x00, 0x03, 0x01],
            chip_id,
            cert_image,
            stpriv,
            session: None,
            l3_rx: Vec::new(),
            l3_tx: VecDeque::new(),
            pairing: [
                PairingSlotState::Written(shipub),
                PairingSlotState::Empty,
                PairingSlotState::Empty,
                PairingSlotState::Empty,
            ],
            r_config: HashMap::new(),
            i_config: HashMap::new(),
            r_mem: HashMap::new(),
            ecc: HashMap::new(),
            mcounter: HashMap::new(),
            macandd: HashMap::new(),
            log,
            fw_received: 0,
            crypto,
            rng: StdRng::seed_from_u64(0x7201),
        };
        (
            state,
            TestKeys {
                stpub,
                shipriv,
                shipub,
            },
        )
    }

    fn chip_status(&self) -> u8 {
        let mut s = 0u8;
        if self.alarm {
            s |= 0x02;
        }
        if self.startup_mode {
            s |= 0x04;
        }
        if self.busy_probes == 0 {
            s |= 0x01;
        }
        s
    }

    fn respond(&mut self, status: u8, payload: &[u8]) {
        let mut f = vec![status, payload.len() as u8];
        f.extend_from_slice(payload);
        let crc = CRC16.checksum(&f);
        f.extend_from_slice(&crc.to_be_bytes());
        self.last_response = Some(f.clone());
        self.pending.push_back(f);
    }

    /// Serve one probe: chip status byte plus, when ready, the response
    /// stream the host may clock out while keeping CSN low.
    fn probe(&mut self) {
        let status = self.chip_status();
        self.miso.clear();
        self.miso.push_back(status);
        if self.busy_probes > 0 {
            self.busy_probes -= 1;
            return;
        }
        if self.alarm {
            return;
        }
        match self.pending.pop_front() {
            Some(mut f) => {
                if self.corrupt_next_crc {
                    let n = f.len();
                    f[n - 1] ^= 0xFF;
                    self.corrupt_next_crc = false;
                }
                self.miso.extend(f);
            }
            None => {
                // 0xFF in the status slot: nothing to send yet
                self.miso.push_back(0xFF);
                self.miso.push_back(0x00);
            }
        }
    }

    fn transfer_byte(&mut self, mosi: u8) -> u8 {
        if !self.csn_low {
            return 0xFF;
        }
        if self.first_mosi.is_none() {
            self.first_mosi = Some(mosi);
            if mosi == 0xAA {
                self.probe();
                return self.miso.pop_front().unwrap_or(0x00);
            }
        }
        if self.first_mosi == Some(0xAA) {
            self.miso.pop_front().unwrap_or(0x00)
        } else {
            self.mosi.push(mosi);
            self.chip_status()
        }
    }

    fn csn_edge(&mut self, low: bool) {
        if low {
            self.csn_low = true;
            self.first_mosi = None;
            self.mosi.clear();
            self.miso.clear();
        } else {
            self.csn_low = false;
            if self.first_mosi.is_some() && self.first_mosi != Some(0xAA) {
                self.handle_request();
            }
            self.first_mosi = None;
        }
    }

    fn handle_request(&mut self) {
        let frame = std::mem::take(&mut self.mosi);
        if frame.len() < 4 {
            return;
        }
        let id = frame[0];
        let len = frame[1] as usize;
        if frame.len() < 4 + len {
            return;
        }
        let want = u16::from_be_bytes([frame[2 + len], frame[3 + len]]);
        if CRC16.checksum(&frame[..2 + len]) != want {
            self.respond(STATUS_CRC_ERR, &[]);
            return;
        }
        let payload = frame[2..2 + len].to_vec();
        match id {
            0x01 => self.get_info(&payload),
            0x02 => self.handshake(&payload),
            0x04 => {
                self.l3_rx.clear();
                self.l3_rx.extend_from_slice(&payload);
                self.l3_chunk();
            }
            0x05 => {
                self.l3_rx.extend_from_slice(&payload);
                self.l3_chunk();
            }
            0x06 | 0x07 => match self.l3_tx.pop_front() {
                Some((status, data)) => self.respond(status, &data),
                None => self.respond(STATUS_GEN_ERR, &[]),
            },
            0x08 => {
                self.session = None;
                self.respond(STATUS_REQUEST_OK, &[]);
            }
            0x10 => {
                if let Some(f) = self.last_response.clone() {
                    self.pending.push_back(f);
                }
            }
            0x20 => {
                self.session = None;
                self.respond(STATUS_SLEEP_OK, &[]);
            }
            0xA2 => {
                let msg = self.log.pop_front().unwrap_or_default();
                self.respond(STATUS_REQUEST_OK, &msg);
            }
            0xB1 => {
                self.fw_received = 0;
                self.respond(STATUS_REQUEST_OK, &[]);
            }
            0xB2 => {
                self.fw_received += payload.len().saturating_sub(2);
                self.respond(STATUS_REQUEST_OK, &[]);
            }
            0xB3 => {
                self.startup_mode = payload.first() == Some(&0x03);
                self.session = None;
                self.respond(STATUS_REQUEST_OK, &[]);
            }
            _ => self.respond(0x7E, &[]),
        }
    }

    fn get_info(&mut self, payload: &[u8]) {
        let object = payload.first().copied().unwrap_or(0xFF);
        let block = payload.get(1).copied().unwrap_or(0) as usize;
        match object {
            0x00 => {
                let start = block * 128;
                if start >= self.cert_image.len() {
                    self.respond(STATUS_REQUEST_OK, &[]);
                } else {
                    let end = usize::min(start + 128, self.cert_image.len());
                    let chunk = self.cert_image[start..end].to_vec();
                    self.respond(STATUS_REQUEST_OK, &chunk);
                }
            }
            0x01 => {
                let id = self.chip_id;
                self.respond(STATUS_REQUEST_OK, &id);
            }
            0x02 => {
                let v = self.riscv_fw_ver;
                self.respond(STATUS_REQUEST_OK, &v);
            }
            0x04 => {
                let v = self.spect_fw_ver;
                self.respond(STATUS_REQUEST_OK, &v);
            }
            0xB0 => {
                let mut header = [0u8; 20];
                header[0] = block as u8;
                header[4..8].copy_from_slice(&self.riscv_fw_ver);
                self.respond(STATUS_REQUEST_OK, &header);
            }
            _ => self.respond(STATUS_GEN_ERR, &[]),
        }
    }

    fn handshake(&mut self, payload: &[u8]) {
        if payload.len() != 33 {
            self.respond(STATUS_GEN_ERR, &[]);
            return;
        }
        let mut ehpub = [0u8; 32];
        ehpub.copy_from_slice(&payload[..32]);
        let idx = payload[32] as usize;
        let shipub = match self.pairing.get(idx) {
            Some(PairingSlotState::Written(key)) => *key,
            _ => {
                self.respond(STATUS_HSK_ERR, &[]);
                return;
            }
        };

        let mut etpriv = [0u8; 32];
        self.rng.fill_bytes(&mut etpriv);
        let etpub = self.crypto.x25519_base(&etpriv);
        let stpub = self.crypto.x25519_base(&self.stpriv);

        let h = self.crypto.sha256(&[&PROTOCOL_NAME]);
        let h = self.crypto.sha256(&[&h, &shipub]);
        let h = self.crypto.sha256(&[&h, &stpub]);
        let h = self.crypto.sha256(&[&h, &ehpub]);
        let h = self.crypto.sha256(&[&h, &[idx as u8]]);
        let h = self.crypto.sha256(&[&h, &etpub]);

        let dh = self.crypto.x25519(&etpriv, &ehpub);
        let ck = self.crypto.hkdf(&PROTOCOL_NAME, &dh);
        let dh = self.crypto.x25519(&etpriv, &shipub);
        let ck = self.crypto.hkdf(&ck, &dh);
        let dh = self.crypto.x25519(&self.stpriv, &ehpub);
        let (ck, kauth) = self.crypto.hkdf2(&ck, &dh);
        let (kcmd, kres) = self.crypto.hkdf2(&ck, &[]);

        let mut auth = SoftCrypto::new();
        auth.aesgcm_encrypt_init(&kauth);
        let mut tag = [0u8; 16];
        auth.aesgcm_encrypt(&[0u8; 12], &h, &mut [], &mut tag)
            .expect("tag over empty plaintext");

        let mut session_crypto = SoftCrypto::new();
        session_crypto.aesgcm_encrypt_init(&kres);
        session_crypto.aesgcm_decrypt_init(&kcmd);
        self.session = Some(DevSession {
            crypto: session_crypto,
            cmd_iv: [0; 12],
            res_iv: [0; 12],
        });
        self.l3_tx.clear();

        let mut rsp = [0u8; 48];
        rsp[..32].copy_from_slice(&etpub);
        rsp[32..].copy_from_slice(&tag);
        self.respond(STATUS_REQUEST_OK, &rsp);
    }

    fn l3_chunk(&mut self) {
        if self.session.is_none() {
            self.respond(STATUS_NO_SESSION, &[]);
            return;
        }
        if self.l3_rx.len() < 2 {
            self.respond(STATUS_REQUEST_CONT, &[]);
            return;
        }
        let size = u16::from_le_bytes([self.l3_rx[0], self.l3_rx[1]]) as usize;
        let total = 2 + size + 16;
        if self.l3_rx.len() < total {
            self.respond(STATUS_REQUEST_CONT, &[]);
            return;
        }

        let mut plain = self.l3_rx[2..2 + size].to_vec();
        let mut tag = [0u8; 16];
        tag.copy_from_slice(&self.l3_rx[2 + size..total]);
        {
            let session = self.session.as_mut().unwrap();
            let iv = session.cmd_iv;
            if session
                .crypto
                .aesgcm_decrypt(&iv, &[], &mut plain, &tag)
                .is_err()
            {
                self.respond(STATUS_TAG_ERR, &[]);
                return;
            }
            iv_bump(&mut session.cmd_iv);
        }

        let mut result = self.execute(&plain);
        if let Some(forced) = self.force_result.take() {
            result = vec![forced];
        }

        let mut packet = vec![0u8; 2];
        packet[..2].copy_from_slice(&(result.len() as u16).to_le_bytes());
        let mut ct = result;
        let mut tag = [0u8; 16];
        {
            let session = self.session.as_mut().unwrap();
            let iv = session.res_iv;
            session
                .crypto
                .aesgcm_encrypt(&iv, &[], &mut ct, &mut tag)
                .expect("result encryption");
            iv_bump(&mut session.res_iv);
        }
        packet.extend_from_slice(&ct);
        packet.extend_from_slice(&tag);

        self.l3_tx.clear();
        let chunks: Vec<&[u8]> = packet.chunks(252).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let status = if i + 1 == chunks.len() {
                STATUS_RESULT_OK
            } else {
                STATUS_RESULT_CONT
            };
            self.l3_tx.push_back((status, chunk.to_vec()));
        }
        self.respond(STATUS_REQUEST_OK, &[]);
    }

    fn execute(&mut self, cmd: &[u8]) -> Vec<u8> {
        let id = cmd[0];
        match id {
            // Ping
            0x01 => {
                let mut res = vec![RESULT_OK];
                res.extend_from_slice(&cmd[1..]);
                res
            }
            // Pairing_Key_Write
            0x10 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]) as usize;
                match self.pairing[slot] {
                    PairingSlotState::Empty => {
                        let mut key = [0u8; 32];
                        key.copy_from_slice(&cmd[4..36]);
                        self.pairing[slot] = PairingSlotState::Written(key);
                        vec![RESULT_OK]
                    }
                    _ => vec![RESULT_FAIL],
                }
            }
            // Pairing_Key_Read
            0x11 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]) as usize;
                match self.pairing[slot] {
                    PairingSlotState::Written(key) => {
                        let mut res = vec![RESULT_OK, 0, 0, 0];
                        res.extend_from_slice(&key);
                        res
                    }
                    PairingSlotState::Empty => vec![0x15],
                    PairingSlotState::Invalid => vec![0x16],
                }
            }
            // Pairing_Key_Invalidate
            0x12 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]) as usize;
                self.pairing[slot] = PairingSlotState::Invalid;
                vec![RESULT_OK]
            }
            // R_Config_Write
            0x20 => {
                let addr = u16::from_le_bytes([cmd[1], cmd[2]]);
                let value = u32::from_le_bytes([cmd[4], cmd[5], cmd[6], cmd[7]]);
                if self.r_config.contains_key(&addr) {
                    vec![RESULT_FAIL]
                } else {
                    self.r_config.insert(addr, value);
                    vec![RESULT_OK]
                }
            }
            // R_Config_Read
            0x21 => {
                let addr = u16::from_le_bytes([cmd[1], cmd[2]]);
                let value = self.r_config.get(&addr).copied().unwrap_or(u32::MAX);
                let mut res = vec![RESULT_OK, 0, 0, 0];
                res.extend_from_slice(&value.to_le_bytes());
                res
            }
            // R_Config_Erase
            0x22 => {
                self.r_config.clear();
                vec![RESULT_OK]
            }
            // I_Config_Write
            0x30 => {
                let addr = u16::from_le_bytes([cmd[1], cmd[2]]);
                let bit = cmd[3];
                let v = self.i_config.entry(addr).or_insert(u32::MAX);
                *v &= !(1u32 << bit);
                vec![RESULT_OK]
            }
            // I_Config_Read
            0x31 => {
                let addr = u16::from_le_bytes([cmd[1], cmd[2]]);
                let value = self.i_config.get(&addr).copied().unwrap_or(u32::MAX);
                let mut res = vec![RESULT_OK, 0, 0, 0];
                res.extend_from_slice(&value.to_le_bytes());
                res
            }
            // R_Mem_Data_Write
            0x40 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                if self.r_mem.contains_key(&slot) {
                    vec![0x10]
                } else {
                    self.r_mem.insert(slot, cmd[4..].to_vec());
                    vec![RESULT_OK]
                }
            }
            // R_Mem_Data_Read
            0x41 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                let mut res = vec![RESULT_OK, 0, 0, 0];
                if let Some(data) = self.r_mem.get(&slot) {
                    res.extend_from_slice(data);
                }
                res
            }
            // R_Mem_Data_Erase
            0x42 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                self.r_mem.remove(&slot);
                vec![RESULT_OK]
            }
            // Random_Value_Get
            0x50 => {
                let n = cmd[1] as usize;
                let mut res = vec![RESULT_OK, 0, 0, 0];
                let mut bytes = vec![0u8; n];
                self.rng.fill_bytes(&mut bytes);
                res.extend_from_slice(&bytes);
                res
            }
            // ECC_Key_Generate
            0x60 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                let curve = cmd[3];
                let mut seed = [0u8; 32];
                self.rng.fill_bytes(&mut seed);
                self.ecc.insert(slot, Self::ecc_slot(curve, 1, seed, &mut self.rng));
                vec![RESULT_OK]
            }
            // ECC_Key_Store
            0x61 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                let curve = cmd[3];
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&cmd[16..48]);
                self.ecc.insert(slot, Self::ecc_slot(curve, 2, seed, &mut self.rng));
                vec![RESULT_OK]
            }
            // ECC_Key_Read
            0x62 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                match self.ecc.get(&slot) {
                    Some(key) => {
                        let mut res = vec![RESULT_OK, key.curve, key.origin];
                        res.extend_from_slice(&[0u8; 13]);
                        res.extend_from_slice(&key.pubkey);
                        res
                    }
                    None => vec![0x12],
                }
            }
            // ECC_Key_Erase
            0x63 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                self.ecc.remove(&slot);
                vec![RESULT_OK]
            }
            // ECDSA_Sign
            0x70 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                match self.ecc.get(&slot) {
                    Some(key) if key.curve == 1 => {
                        let mut res = vec![RESULT_OK];
                        res.extend_from_slice(&[0u8; 15]);
                        let mut sig = [0u8; 64];
                        self.rng.fill_bytes(&mut sig);
                        res.extend_from_slice(&sig);
                        res
                    }
                    _ => vec![0x12],
                }
            }
            // EdDSA_Sign
            0x71 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                match self.ecc.get(&slot) {
                    Some(key) if key.curve == 2 => {
                        let signer = SigningKey::from_bytes(&key.seed);
                        let sig = signer.sign(&cmd[16..]);
                        let mut res = vec![RESULT_OK];
                        res.extend_from_slice(&[0u8; 15]);
                        res.extend_from_slice(&sig.to_bytes());
                        res
                    }
                    _ => vec![0x12],
                }
            }
            // MCounter_Init
            0x80 => {
                let index = u16::from_le_bytes([cmd[1], cmd[2]]);
                let value = u32::from_le_bytes([cmd[4], cmd[5], cmd[6], cmd[7]]);
                self.mcounter.insert(index, value);
                vec![RESULT_OK]
            }
            // MCounter_Update
            0x81 => {
                let index = u16::from_le_bytes([cmd[1], cmd[2]]);
                match self.mcounter.get_mut(&index) {
                    None => vec![0x11],
                    Some(0) => vec![0x10],
                    Some(v) => {
                        *v -= 1;
                        vec![RESULT_OK]
                    }
                }
            }
            // MCounter_Get
            0x82 => {
                let index = u16::from_le_bytes([cmd[1], cmd[2]]);
                match self.mcounter.get(&index) {
                    None => vec![0x11],
                    Some(v) => {
                        let mut res = vec![RESULT_OK, 0, 0, 0];
                        res.extend_from_slice(&v.to_le_bytes());
                        res
                    }
                }
            }
            // MAC_And_Destroy
            0x90 => {
                let slot = u16::from_le_bytes([cmd[1], cmd[2]]);
                let mut data_in = [0u8; 32];
                data_in.copy_from_slice(&cmd[4..36]);
                let state = self.macandd.get(&slot).copied().unwrap_or([0u8; 32]);
                let out = self.crypto.hmac_sha256(&state, &[&data_in]);
                self.macandd.insert(slot, data_in);
                let mut res = vec![RESULT_OK, 0, 0, 0];
                res.extend_from_slice(&out);
                res
            }
            _ => vec![0x02],
        }
    }

    fn ecc_slot(curve: u8, origin: u8, seed: [u8; 32], rng: &mut StdRng) -> EccSlot {
        let pubkey = if curve == 2 {
            SigningKey::from_bytes(&seed)
                .verifying_key()
                .to_bytes()
                .to_vec()
        } else {
            let mut p = vec![0u8; 64];
            rng.fill_bytes(&mut p);
            p
        };
        EccSlot {
            curve,
            origin,
            seed,
            pubkey,
        }
    }
}

/// Shared handle on the model, cloned into the SPI and CSN endpoints.
#[derive(Clone)]
pub struct Model(Rc<RefCell<ModelState>>);

impl Model {
    pub fn with_fw(riscv_fw_ver: [u8; 4]) -> (Model, TestKeys) {
        let (state, keys) = ModelState::new(riscv_fw_ver);
        (Model(Rc::new(RefCell::new(state))), keys)
    }

    pub fn new() -> (Model, TestKeys) {
        Self::with_fw([0x00, 0x00, 0x00, 0x02])
    }

    pub fn spi(&self) -> ModelSpi {
        ModelSpi(self.0.clone())
    }

    pub fn csn(&self) -> ModelCsn {
        ModelCsn(self.0.clone())
    }

    pub fn set_busy_probes(&self, n: u32) {
        self.0.borrow_mut().busy_probes = n;
    }

    pub fn set_alarm(&self, alarm: bool) {
        self.0.borrow_mut().alarm = alarm;
    }

    pub fn corrupt_next_crc(&self) {
        self.0.borrow_mut().corrupt_next_crc = true;
    }

    pub fn force_result(&self, result: u8) {
        self.0.borrow_mut().force_result = Some(result);
    }

    pub fn session_open(&self) -> bool {
        self.0.borrow().session.is_some()
    }

    pub fn fw_received(&self) -> usize {
        self.0.borrow().fw_received
    }

    pub fn ed25519_pubkey(&self, slot: u16) -> Option<[u8; 32]> {
        let state = self.0.borrow();
        let key = state.ecc.get(&slot)?;
        if key.curve != 2 {
            return None;
        }
        let mut p = [0u8; 32];
        p.copy_from_slice(&key.pubkey);
        Some(p)
    }
}

pub struct ModelSpi(Rc<RefCell<ModelState>>);
pub struct ModelCsn(Rc<RefCell<ModelState>>);

impl embedded_hal_async::spi::ErrorType for ModelSpi {
    type Error = Infallible;
}

impl embedded_hal_async::spi::SpiBus<u8> for ModelSpi {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        for w in words {
            *w = state.transfer_byte(0x00);
        }
        Ok(())
    }

    async fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        for w in words {
            state.transfer_byte(*w);
        }
        Ok(())
    }

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        let n = usize::max(read.len(), write.len());
        for i in 0..n {
            let out = write.get(i).copied().unwrap_or(0x00);
            let in_byte = state.transfer_byte(out);
            if let Some(r) = read.get_mut(i) {
                *r = in_byte;
            }
        }
        Ok(())
    }

    async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        for w in words {
            *w = state.transfer_byte(*w);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl embedded_hal::digital::ErrorType for ModelCsn {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for ModelCsn {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().csn_edge(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().csn_edge(false);
        Ok(())
    }
}

pub type TestDriver = Tropic01<ModelCsn, ModelSpi, NoIntPin, SoftCrypto>;

/// Driver wired to a fresh model, `init()` already done.
pub async fn rig() -> (TestDriver, Model, TestKeys) {
    rig_with_fw([0x00, 0x00, 0x00, 0x02]).await
}

pub async fn rig_with_fw(riscv_fw_ver: [u8; 4]) -> (TestDriver, Model, TestKeys) {
    let (model, keys) = Model::with_fw(riscv_fw_ver);
    let mut t = Tropic01::new(
        model.spi(),
        model.csn(),
        NoIntPin,
        SoftCrypto::new(),
        Config::default(),
    )
    .expect("default config is valid");
    t.init().await.expect("init against the model");
    (t, model, keys)
}

/// Driver with an open Secure Session on pairing slot 0.
pub async fn rig_with_session() -> (TestDriver, Model, TestKeys) {
    let (mut t, model, keys) = rig().await;
    let mut rng = StdRng::seed_from_u64(0xE9);
    t.session_start(
        &mut rng,
        &keys.stpub,
        tropic01::session::PairingKeySlot::Sh0,
        &keys.shipriv,
        &keys.shipub,
    )
    .await
    .expect("handshake against the model");
    (t, model, keys)
}
