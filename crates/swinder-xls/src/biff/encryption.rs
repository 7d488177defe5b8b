//! FILEPASS parsing and record payload decryption.
//!
//! Supported: BIFF8 legacy RC4 (Office 97, MD5 key derivation) and BIFF8 RC4 CryptoAPI (SHA-1 or
//! MD5). XOR obfuscation is recognized but not decrypted.
//!
//! Encrypted streams use one RC4 key per 1024-byte block of the *stream*, so a payload at stream
//! offset `o` is decrypted with block `o / 1024` after discarding `o % 1024` keystream bytes.
//! Record headers are never encrypted but still advance the keystream position.

use thiserror::Error;
use zeroize::Zeroizing;

use super::bytes::{read_u16, ByteReader};
use super::records::{RECORD_BOF_BIFF5, RECORD_BOF_BIFF8, RECORD_FILEPASS};
use super::BiffVersion;

pub(crate) mod cryptoapi;
pub(crate) mod rc4;

use cryptoapi::{CryptoApiInfo, HashAlg};
use rc4::Rc4;

/// Password Excel uses for workbooks that are encrypted without a user password
/// (e.g. write-protected workbooks).
pub const DEFAULT_PASSWORD: &str = "VelvetSweatshop";

const PAYLOAD_BLOCK_SIZE: usize = 1024;

// FILEPASS.wEncryptionType.
const ENCRYPTION_TYPE_XOR: u16 = 0x0000;
const ENCRYPTION_TYPE_RC4: u16 = 0x0001;
// vMajor of the RC4 encryption header: 1 is the legacy layout, 2-4 are CryptoAPI.
const RC4_VERSION_LEGACY: u16 = 0x0001;

const RECORD_INTERFACEHDR: u16 = 0x00E1;
const RECORD_RRDHEAD: u16 = 0x0138;
const RECORD_USEREXCL: u16 = 0x0194;
const RECORD_FILELOCK: u16 = 0x0195;
const RECORD_RRDINFO: u16 = 0x0196;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("invalid FILEPASS record: {0}")]
    InvalidFilePass(String),
    #[error("unsupported encryption scheme: {0}")]
    UnsupportedEncryption(String),
    #[error("wrong password")]
    WrongPassword,
}

/// Decoded FILEPASS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FilePass {
    /// XOR obfuscation (BIFF5, or BIFF8 with `wEncryptionType == 0`).
    Xor { key: u16, verifier: u16 },
    /// Office 97 RC4.
    Rc4 {
        salt: [u8; 16],
        encrypted_verifier: [u8; 16],
        encrypted_verifier_hash: [u8; 16],
    },
    Rc4CryptoApi(CryptoApiInfo),
}

impl FilePass {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            FilePass::Xor { .. } => "XOR obfuscation",
            FilePass::Rc4 { .. } => "RC4",
            FilePass::Rc4CryptoApi(_) => "RC4 CryptoAPI",
        }
    }
}

fn invalid(msg: impl Into<String>) -> DecryptError {
    DecryptError::InvalidFilePass(msg.into())
}

pub(crate) fn parse_filepass(version: BiffVersion, data: &[u8]) -> Result<FilePass, DecryptError> {
    let field = |offset: usize, name: &str| {
        read_u16(data, offset)
            .ok_or_else(|| invalid(format!("truncated FILEPASS while reading {name}")))
    };

    if version == BiffVersion::Biff5 {
        return Ok(FilePass::Xor {
            key: field(0, "key")?,
            verifier: field(2, "verifier")?,
        });
    }

    match field(0, "wEncryptionType")? {
        ENCRYPTION_TYPE_XOR => Ok(FilePass::Xor {
            key: field(2, "key")?,
            verifier: field(4, "verifier")?,
        }),
        ENCRYPTION_TYPE_RC4 => match field(2, "vMajor")? {
            RC4_VERSION_LEGACY => {
                let mut r = ByteReader::at(data, 6);
                let truncated = |_| invalid("truncated RC4 FILEPASS");
                let mut salt = [0u8; 16];
                salt.copy_from_slice(r.bytes(16).map_err(truncated)?);
                let mut encrypted_verifier = [0u8; 16];
                encrypted_verifier.copy_from_slice(r.bytes(16).map_err(truncated)?);
                let mut encrypted_verifier_hash = [0u8; 16];
                encrypted_verifier_hash.copy_from_slice(r.bytes(16).map_err(truncated)?);
                Ok(FilePass::Rc4 {
                    salt,
                    encrypted_verifier,
                    encrypted_verifier_hash,
                })
            }
            2..=4 => Ok(FilePass::Rc4CryptoApi(cryptoapi::parse_cryptoapi_info(
                data.get(2..).unwrap_or_default(),
            )?)),
            other => Err(DecryptError::UnsupportedEncryption(format!(
                "RC4 FILEPASS version {other}"
            ))),
        },
        other => Err(DecryptError::UnsupportedEncryption(format!(
            "FILEPASS wEncryptionType=0x{other:04X}"
        ))),
    }
}

#[derive(Clone, Copy)]
enum Scheme {
    Legacy,
    CryptoApi { hash_alg: HashAlg, key_len: usize },
}

/// Verified key material for decrypting record payloads.
pub(crate) struct Decryptor {
    scheme: Scheme,
    key_material: Zeroizing<Vec<u8>>,
}

impl Decryptor {
    /// Verify `password` against the FILEPASS verifier and build a decryptor.
    pub(crate) fn new(filepass: &FilePass, password: &str) -> Result<Self, DecryptError> {
        match filepass {
            FilePass::Xor { .. } => Err(DecryptError::UnsupportedEncryption(
                "XOR obfuscation".to_string(),
            )),
            FilePass::Rc4 {
                salt,
                encrypted_verifier,
                encrypted_verifier_hash,
            } => {
                let key_material = rc4::derive_legacy_key_material(password, salt);
                if !rc4::verify_legacy_password(
                    &key_material,
                    encrypted_verifier,
                    encrypted_verifier_hash,
                ) {
                    return Err(DecryptError::WrongPassword);
                }
                Ok(Self {
                    scheme: Scheme::Legacy,
                    key_material,
                })
            }
            FilePass::Rc4CryptoApi(info) => {
                let key_material = cryptoapi::derive_key_material(info, password);
                if !cryptoapi::verify_password(info, &key_material) {
                    return Err(DecryptError::WrongPassword);
                }
                Ok(Self {
                    scheme: Scheme::CryptoApi {
                        hash_alg: info.hash_alg,
                        key_len: info.key_len,
                    },
                    key_material,
                })
            }
        }
    }

    fn block_key(&self, block: u32) -> Zeroizing<Vec<u8>> {
        match self.scheme {
            Scheme::Legacy => rc4::derive_legacy_block_key(&self.key_material, block),
            Scheme::CryptoApi { hash_alg, key_len } => {
                cryptoapi::derive_block_key(hash_alg, &self.key_material, block, key_len)
            }
        }
    }

    /// Decrypt (or encrypt; RC4 is symmetric) `bytes` located at `stream_offset` in place.
    pub(crate) fn decrypt_at(&self, bytes: &mut [u8], stream_offset: usize) {
        let mut stream_pos = stream_offset;
        let mut pos = 0usize;
        while pos < bytes.len() {
            let block = (stream_pos / PAYLOAD_BLOCK_SIZE) as u32;
            let in_block = stream_pos % PAYLOAD_BLOCK_SIZE;
            let take = (bytes.len() - pos).min(PAYLOAD_BLOCK_SIZE - in_block);

            let key = self.block_key(block);
            let mut cipher = Rc4::new(&key);
            drop(key);
            cipher.discard(in_block);
            cipher.apply_keystream(&mut bytes[pos..pos + take]);

            stream_pos += take;
            pos += take;
        }
    }
}

/// Records whose payloads stay plaintext in an encrypted stream.
pub(crate) fn is_never_encrypted_record(record_id: u16) -> bool {
    matches!(
        record_id,
        RECORD_BOF_BIFF8
            | RECORD_BOF_BIFF5
            | RECORD_FILEPASS
            | RECORD_USEREXCL
            | RECORD_FILELOCK
            | RECORD_INTERFACEHDR
            | RECORD_RRDINFO
            | RECORD_RRDHEAD
    )
}
