// Chip information and lifecycle requests (L2 level, no session needed)

/// Object selector of a `Get_Info` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GetInfoObject {
    /// Certificate store, fetched in 128-byte blocks
    X509Certificate = 0x00,
    /// 128 bytes of chip identity
    ChipId = 0x01,
    /// RISC-V main firmware version (bootloader version in startup mode)
    RiscvFwVersion = 0x02,
    /// SPECT coprocessor firmware version
    SpectFwVersion = 0x04,
    /// Header of one firmware bank
    FwBank = 0xB0,
}

/// Reboot flavor carried by a `Startup_Req`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartupId {
    /// Restart into the application firmware
    Reboot = 0x01,
    /// Restart into the bootloader and stay there (firmware update, bank
    /// header inspection)
    MaintenanceReboot = 0x03,
}

/// Sleep flavor carried by a `Sleep_Req`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepKind {
    /// Regular sleep; any L2 request wakes the chip up again
    Sleep = 0x05,
}

/// Firmware bank selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FwBankId {
    Fw1 = 0x01,
    Fw2 = 0x02,
    Spect1 = 0x11,
    Spect2 = 0x12,
}

/// Payload of a `Get_Info` request: object selector and block index.
pub fn get_info_req(object: GetInfoObject, block_index: u8) -> [u8; 2] {
    [object as u8, block_index]
}

/// Payload of a `Startup_Req`.
pub fn startup_req(startup_id: StartupId) -> [u8; 1] {
    [startup_id as u8]
}

/// Payload of a `Sleep_Req`.
pub fn sleep_req(kind: SleepKind) -> [u8; 1] {
    [kind as u8]
}

/// Payload of a `Mutable_FW_Update_Req`: the bank to erase and rewrite.
pub fn mutable_fw_update_req(bank: FwBankId) -> [u8; 1] {
    [bank as u8]
}

/// Fixed part of a `Mutable_FW_Update_Data` payload: byte offset of the
/// chunk that follows.
pub fn mutable_fw_update_data(offset: u16) -> [u8; 2] {
    offset.to_le_bytes()
}

/// Size of one `Get_Info` response block.
pub const GET_INFO_BLOCK_SIZE: usize = 128;
/// Number of certificate store blocks the chip can serve.
pub const CERT_STORE_BLOCKS_MAX: u8 = 30;
/// Certificate store image capacity: 30 blocks of 128 bytes.
pub const CERT_STORE_SIZE_MAX: usize = CERT_STORE_BLOCKS_MAX as usize * GET_INFO_BLOCK_SIZE;
/// Certificates held by the store. The first one is the device certificate
/// carrying STPUB.
pub const CERT_STORE_CERT_CNT: usize = 4;
/// Fixed store header: version, count and four big-endian length fields.
const CERT_STORE_HEADER_SIZE: usize = 2 + 2 * CERT_STORE_CERT_CNT;

/// Parsed layout of the certificate store image.
///
/// The store itself stays in the caller's buffer; this type only remembers
/// where each DER certificate sits.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CertStore {
    count: usize,
    lens: [usize; CERT_STORE_CERT_CNT],
}

impl CertStore {
    /// Parse the store header. `buf` must hold at least the header.
    pub fn parse(buf: &[u8]) -> Option<CertStore> {
        if buf.len() < CERT_STORE_HEADER_SIZE {
            return None;
        }
        let count = buf[1] as usize;
        if count == 0 || count > CERT_STORE_CERT_CNT {
            return None;
        }
        let mut lens = [0usize; CERT_STORE_CERT_CNT];
        for (i, len) in lens.iter_mut().enumerate() {
            *len = u16::from_be_bytes([buf[2 + 2 * i], buf[3 + 2 * i]]) as usize;
        }
        Some(CertStore { count, lens })
    }

    /// Number of certificates present.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Total bytes of the store image, header included.
    pub fn total_size(&self) -> usize {
        CERT_STORE_HEADER_SIZE + self.lens[..self.count].iter().sum::<usize>()
    }

    /// The `idx`-th DER certificate, sliced out of the store image.
    pub fn cert<'a>(&self, buf: &'a [u8], idx: usize) -> Option<&'a [u8]> {
        if idx >= self.count {
            return None;
        }
        let start = CERT_STORE_HEADER_SIZE + self.lens[..idx].iter().sum::<usize>();
        buf.get(start..start + self.lens[idx])
    }
}

/// Slice the chip's static X25519 public key out of its device certificate.
///
/// No chain validation happens here; the key follows the X25519
/// SubjectPublicKeyInfo marker (OID 1.3.101.110, then a 33-byte BIT STRING)
/// and is returned verbatim.
pub fn get_st_pub(cert: &[u8]) -> Option<[u8; 32]> {
    const MARKER: [u8; 5] = [0x65, 0x6E, 0x03, 0x21, 0x00];
    let pos = cert
        .windows(MARKER.len())
        .position(|w| w == MARKER.as_slice())?;
    let key = cert.get(pos + MARKER.len()..pos + MARKER.len() + 32)?;
    let mut stpub = [0u8; 32];
    stpub.copy_from_slice(key);
    Some(stpub)
}

/// 128 bytes of structured chip identity returned by `Get_Info`.
#[derive(Clone)]
pub struct ChipId([u8; 128]);

impl Default for ChipId {
    fn default() -> Self {
        ChipId([0; 128])
    }
}

impl ChipId {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the identity layout itself.
    pub fn chip_id_ver(&self) -> [u8; 4] {
        let mut v = [0u8; 4];
        v.copy_from_slice(&self.0[0..4]);
        v
    }

    /// Silicon revision, four ASCII characters.
    pub fn silicon_rev(&self) -> &[u8] {
        &self.0[28..32]
    }

    /// Package type identifier.
    pub fn package_type_id(&self) -> u16 {
        u16::from_be_bytes([self.0[32], self.0[33]])
    }

    /// Provisioning date, days since 2020-01-01.
    pub fn provisioning_date(&self) -> u16 {
        u16::from_be_bytes([self.0[36], self.0[37]])
    }

    /// Serial number block.
    pub fn serial_number(&self) -> &[u8] {
        &self.0[112..128]
    }

    /// Whole identity blob.
    pub fn as_bytes(&self) -> &[u8; 128] {
        &self.0
    }
}

impl AsMut<[u8]> for ChipId {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl core::fmt::Display for ChipId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let ver = self.chip_id_ver();
        write!(f, "chip id v{}.{}, silicon rev ", ver[0], ver[1])?;
        for &c in self.silicon_rev() {
            let c = if c.is_ascii_graphic() { c as char } else { '?' };
            write!(f, "{c}")?;
        }
        write!(f, ", serial ")?;
        for b in self.serial_number() {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChipId {
    fn format(&self, fmt: defmt::Formatter) {
        let ver = self.chip_id_ver();
        defmt::write!(
            fmt,
            "chip id v{}.{}, silicon rev {}, serial {}",
            ver[0],
            ver[1],
            self.silicon_rev(),
            self.serial_number()
        );
    }
}
