use md5::Md5;
use sha1::Digest as _;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::ct::ct_eq;

/// RC4 stream cipher (KSA + PRGA).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Key schedule. An empty key yields the identity permutation.
    pub(crate) fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i as u8;
        }

        if !key.is_empty() {
            let mut j: u8 = 0;
            for idx in 0..256usize {
                j = j.wrapping_add(s[idx]).wrapping_add(key[idx % key.len()]);
                s.swap(idx, j as usize);
            }
        }

        Self { s, i: 0, j: 0 }
    }

    pub(crate) fn apply_keystream(&mut self, data: &mut [u8]) {
        for b in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let idx = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *b ^= self.s[idx as usize];
        }
    }

    /// Advance the keystream by `n` bytes without producing output.
    pub(crate) fn discard(&mut self, mut n: usize) {
        let mut scratch = Zeroizing::new([0u8; 64]);
        while n > 0 {
            let take = n.min(scratch.len());
            self.apply_keystream(&mut scratch[..take]);
            n -= take;
        }
    }
}

pub(crate) fn utf16le_bytes(s: &str) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(s.len().saturating_mul(2)));
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

pub(crate) fn md5_bytes(chunks: &[&[u8]]) -> [u8; 16] {
    let mut h = Md5::new();
    for chunk in chunks {
        h.update(chunk);
    }
    let mut digest = h.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    digest.as_mut_slice().zeroize();
    out
}

/// Intermediate key of the legacy Office 97 RC4 scheme.
///
/// `H0 = MD5(UTF16LE(password))`; the first 5 bytes of `H0` followed by the salt are repeated 16
/// times and hashed again. The first 5 bytes of that digest seed every block key.
pub(crate) fn derive_legacy_key_material(password: &str, salt: &[u8; 16]) -> Zeroizing<Vec<u8>> {
    let pw_bytes = utf16le_bytes(password);
    let mut h0 = md5_bytes(&[&pw_bytes]);
    drop(pw_bytes);

    let mut buf = Zeroizing::new(Vec::with_capacity(16 * 21));
    for _ in 0..16 {
        buf.extend_from_slice(&h0[..5]);
        buf.extend_from_slice(salt);
    }
    h0.zeroize();

    let mut h1 = md5_bytes(&[&buf]);
    let out = Zeroizing::new(h1[..5].to_vec());
    h1.zeroize();
    out
}

/// Per-1024-byte-block RC4 key: `MD5(key_material || block_le32)`, all 16 bytes.
pub(crate) fn derive_legacy_block_key(key_material: &[u8], block: u32) -> Zeroizing<Vec<u8>> {
    let mut digest = md5_bytes(&[key_material, &block.to_le_bytes()]);
    let key = Zeroizing::new(digest.to_vec());
    digest.zeroize();
    key
}

/// Check `password` against the legacy RC4 verifier pair from FILEPASS.
///
/// The verifier and its hash are one continuous block-0 keystream; the password is right when
/// `MD5(verifier)` equals the decrypted hash.
pub(crate) fn verify_legacy_password(
    key_material: &[u8],
    encrypted_verifier: &[u8; 16],
    encrypted_verifier_hash: &[u8; 16],
) -> bool {
    let key = derive_legacy_block_key(key_material, 0);
    let mut rc4 = Rc4::new(&key);

    let mut buf = Zeroizing::new([0u8; 32]);
    buf[..16].copy_from_slice(encrypted_verifier);
    buf[16..].copy_from_slice(encrypted_verifier_hash);
    rc4.apply_keystream(&mut buf[..]);

    let mut expected = md5_bytes(&[&buf[..16]]);
    let ok = ct_eq(&expected, &buf[16..]);
    expected.zeroize();
    ok
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build the FILEPASS verifier fields for `password` the way a writer would.
    pub(crate) fn encrypt_legacy_verifier(
        password: &str,
        salt: &[u8; 16],
        verifier: &[u8; 16],
    ) -> ([u8; 16], [u8; 16]) {
        let material = derive_legacy_key_material(password, salt);
        let key = derive_legacy_block_key(&material, 0);
        let mut rc4 = Rc4::new(&key);

        let mut buf = [0u8; 32];
        buf[..16].copy_from_slice(verifier);
        buf[16..].copy_from_slice(&md5_bytes(&[verifier]));
        rc4.apply_keystream(&mut buf);

        let mut enc_verifier = [0u8; 16];
        enc_verifier.copy_from_slice(&buf[..16]);
        let mut enc_hash = [0u8; 16];
        enc_hash.copy_from_slice(&buf[16..]);
        (enc_verifier, enc_hash)
    }

    #[test]
    fn rc4_matches_published_test_vector() {
        // "Key" / "Plaintext" from the original RC4 test vectors.
        let mut data = *b"Plaintext";
        Rc4::new(b"Key").apply_keystream(&mut data);
        assert_eq!(
            data,
            [0xBB, 0xF3, 0x16, 0xE8, 0xD9, 0x40, 0xAF, 0x0A, 0xD3]
        );
    }

    #[test]
    fn discard_matches_consuming_the_keystream() {
        let mut a = Rc4::new(b"Secret");
        let mut b = Rc4::new(b"Secret");

        let mut skipped = [0u8; 100];
        a.apply_keystream(&mut skipped);
        b.discard(100);

        let mut x = [0x55u8; 8];
        let mut y = [0x55u8; 8];
        a.apply_keystream(&mut x);
        b.apply_keystream(&mut y);
        assert_eq!(x, y);
    }

    #[test]
    fn legacy_verifier_accepts_only_the_right_password() {
        let salt = [0x11u8; 16];
        let verifier: [u8; 16] = core::array::from_fn(|i| i as u8);
        let (enc_verifier, enc_hash) = encrypt_legacy_verifier("VelvetSweatshop", &salt, &verifier);

        let right = derive_legacy_key_material("VelvetSweatshop", &salt);
        assert!(verify_legacy_password(&right, &enc_verifier, &enc_hash));

        let wrong = derive_legacy_key_material("velvetsweatshop", &salt);
        assert!(!verify_legacy_password(&wrong, &enc_verifier, &enc_hash));
    }

    #[test]
    fn block_keys_differ_per_block() {
        let material = derive_legacy_key_material("pw", &[0u8; 16]);
        assert_eq!(material.len(), 5);
        assert_ne!(
            derive_legacy_block_key(&material, 0),
            derive_legacy_block_key(&material, 1)
        );
        assert_eq!(derive_legacy_block_key(&material, 0).len(), 16);
    }
}
