use pretty_assertions::assert_eq;
use swinder_model::CellValue;
use swinder_xls::{load_xls_bytes, EncryptionStatus, LoadOptions};

mod common;

use common::xls_fixture_builder::{self as xls, Version};

fn workbook_with_filepass(filepass: &[u8]) -> Vec<u8> {
    let mut sheet = Vec::new();
    xls::push_record(&mut sheet, xls::RECORD_LABEL, &xls::label(Version::Biff8, 0, 0, 0, "plain"));
    xls::WorkbookBuilder::biff8()
        .global(xls::RECORD_FILEPASS, filepass)
        .sheet("Sheet1", sheet)
        .build_xls()
}

#[test]
fn unknown_encryption_type_is_flagged_and_payloads_read_as_stored() {
    let bytes = workbook_with_filepass(&0x0002u16.to_le_bytes());
    let result = load_xls_bytes(&bytes, &LoadOptions::default()).expect("load xls");

    assert_eq!(
        result.encryption,
        EncryptionStatus {
            password_protected: true,
            encryption_type_supported: false,
        }
    );
    assert!(!result.warnings.is_empty());
    assert_eq!(
        result.workbook.sheets[0].get_cell(0, 0).map(|c| &c.value),
        Some(&CellValue::String("plain".to_owned()))
    );
}

#[test]
fn xor_obfuscation_is_recognized_but_unsupported() {
    let mut filepass = Vec::new();
    for v in [0x0000u16, 0x1234, 0xABCD] {
        filepass.extend_from_slice(&v.to_le_bytes());
    }
    let bytes = workbook_with_filepass(&filepass);
    let result = load_xls_bytes(&bytes, &LoadOptions::default()).expect("load xls");

    assert!(result.encryption.password_protected);
    assert!(!result.encryption.encryption_type_supported);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.message.contains("XOR")));
}

#[test]
fn unencrypted_workbook_reports_no_protection() {
    let bytes = xls::build_shared_string_workbook().build_xls();
    let result = load_xls_bytes(&bytes, &LoadOptions::default()).expect("load xls");
    assert_eq!(result.encryption, EncryptionStatus::default());
    assert!(!result.encryption.password_protected);
}
