//! RC4 CryptoAPI FILEPASS (`EncryptionVersionInfo` 2.2, 3.2 or 4.2).

use md5::Md5;
use sha1::{Digest as _, Sha1};
use zeroize::{Zeroize, Zeroizing};

use crate::biff::bytes::{read_u32, ByteReader};
use crate::ct::ct_eq;

use super::rc4::{utf16le_bytes, Rc4};
use super::DecryptError;

// CryptoAPI ALG_ID values.
const CALG_RC4: u32 = 0x0000_6801;
const CALG_MD5: u32 = 0x0000_8003;
const CALG_SHA1: u32 = 0x0000_8004;

// EncryptionHeader is 8 DWORDs plus a CSP name; cap it so a hostile size cannot run us off.
const MAX_ENCRYPTION_HEADER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HashAlg {
    Sha1,
    Md5,
}

impl HashAlg {
    fn from_alg_id(alg_id_hash: u32) -> Option<Self> {
        match alg_id_hash {
            // Zero means "provider default", which is SHA-1 for RC4.
            0 | CALG_SHA1 => Some(HashAlg::Sha1),
            CALG_MD5 => Some(HashAlg::Md5),
            _ => None,
        }
    }

    fn digest_len(self) -> usize {
        match self {
            HashAlg::Sha1 => 20,
            HashAlg::Md5 => 16,
        }
    }

    fn hash(self, chunks: &[&[u8]]) -> Zeroizing<Vec<u8>> {
        let mut out = match self {
            HashAlg::Sha1 => {
                let mut h = Sha1::new();
                for chunk in chunks {
                    h.update(chunk);
                }
                h.finalize().to_vec()
            }
            HashAlg::Md5 => {
                let mut h = Md5::new();
                for chunk in chunks {
                    h.update(chunk);
                }
                h.finalize().to_vec()
            }
        };
        let wrapped = Zeroizing::new(out.clone());
        out.zeroize();
        wrapped
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CryptoApiInfo {
    pub(crate) hash_alg: HashAlg,
    /// RC4 key length in bytes (`KeySize / 8`; zero bits means 40).
    pub(crate) key_len: usize,
    pub(crate) salt: Vec<u8>,
    pub(crate) encrypted_verifier: [u8; 16],
    pub(crate) encrypted_verifier_hash: Vec<u8>,
}

fn invalid(msg: impl Into<String>) -> DecryptError {
    DecryptError::InvalidFilePass(msg.into())
}

/// Parse the CryptoAPI FILEPASS body that follows `wEncryptionType`.
///
/// `data` starts at the version info (`vMajor`, `vMinor`).
pub(crate) fn parse_cryptoapi_info(data: &[u8]) -> Result<CryptoApiInfo, DecryptError> {
    let mut r = ByteReader::new(data);
    let truncated = |_| invalid("truncated CryptoAPI FILEPASS");

    let _version_major = r.u16().map_err(truncated)?;
    let _version_minor = r.u16().map_err(truncated)?;
    let _flags = r.u32().map_err(truncated)?;
    let header_size = r.u32().map_err(truncated)? as usize;
    if !(32..=MAX_ENCRYPTION_HEADER_SIZE).contains(&header_size) {
        return Err(invalid(format!("EncryptionHeader size {header_size} out of range")));
    }

    let header = r.bytes(header_size).map_err(truncated)?;
    let alg_id = read_u32(header, 8).unwrap_or(0);
    let alg_id_hash = read_u32(header, 12).unwrap_or(0);
    let key_size_bits = read_u32(header, 16).unwrap_or(0);

    if alg_id != 0 && alg_id != CALG_RC4 {
        return Err(DecryptError::UnsupportedEncryption(format!(
            "CryptoAPI cipher alg_id=0x{alg_id:08X}"
        )));
    }
    let hash_alg = HashAlg::from_alg_id(alg_id_hash).ok_or_else(|| {
        DecryptError::UnsupportedEncryption(format!("CryptoAPI hash alg_id=0x{alg_id_hash:08X}"))
    })?;
    let key_size_bits = if key_size_bits == 0 { 40 } else { key_size_bits };
    if key_size_bits % 8 != 0 || !(40..=128).contains(&key_size_bits) {
        return Err(invalid(format!("RC4 key size {key_size_bits} bits")));
    }

    let salt_size = r.u32().map_err(truncated)? as usize;
    if salt_size != 16 {
        return Err(invalid(format!("salt size {salt_size} (expected 16)")));
    }
    let salt = r.bytes(salt_size).map_err(truncated)?.to_vec();
    let mut encrypted_verifier = [0u8; 16];
    encrypted_verifier.copy_from_slice(r.bytes(16).map_err(truncated)?);
    let hash_size = r.u32().map_err(truncated)? as usize;
    if hash_size != hash_alg.digest_len() {
        return Err(invalid(format!("verifier hash size {hash_size}")));
    }
    let encrypted_verifier_hash = r.bytes(hash_size).map_err(truncated)?.to_vec();

    Ok(CryptoApiInfo {
        hash_alg,
        key_len: (key_size_bits / 8) as usize,
        salt,
        encrypted_verifier,
        encrypted_verifier_hash,
    })
}

/// `Hash(salt || UTF16LE(password))`; RC4 CryptoAPI applies no spin count.
pub(crate) fn derive_key_material(info: &CryptoApiInfo, password: &str) -> Zeroizing<Vec<u8>> {
    let pw_bytes = utf16le_bytes(password);
    info.hash_alg.hash(&[&info.salt, &pw_bytes])
}

/// RC4 key for a 1024-byte block. 40-bit keys are zero-padded to 16 bytes, as CryptoAPI does.
pub(crate) fn derive_block_key(
    hash_alg: HashAlg,
    key_material: &[u8],
    block: u32,
    key_len: usize,
) -> Zeroizing<Vec<u8>> {
    let digest = hash_alg.hash(&[key_material, &block.to_le_bytes()]);
    let mut key = Zeroizing::new(digest[..key_len.min(digest.len())].to_vec());
    if key_len == 5 {
        key.resize(16, 0);
    }
    key
}

pub(crate) fn verify_password(info: &CryptoApiInfo, key_material: &[u8]) -> bool {
    let key = derive_block_key(info.hash_alg, key_material, 0, info.key_len);
    let mut rc4 = Rc4::new(&key);
    drop(key);

    let mut buf = Zeroizing::new(Vec::with_capacity(16 + info.encrypted_verifier_hash.len()));
    buf.extend_from_slice(&info.encrypted_verifier);
    buf.extend_from_slice(&info.encrypted_verifier_hash);
    rc4.apply_keystream(&mut buf[..]);

    let expected = info.hash_alg.hash(&[&buf[..16]]);
    ct_eq(&expected, &buf[16..])
}
