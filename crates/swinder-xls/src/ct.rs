use subtle::ConstantTimeEq;

/// Constant-time byte slice equality for password verifier checks.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}
