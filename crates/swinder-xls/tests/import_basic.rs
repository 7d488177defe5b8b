use pretty_assertions::assert_eq;
use swinder_model::CellValue;
use swinder_xls::{load_xls_bytes, load_xls_path, BiffVersion, LoadError, LoadOptions};

mod common;

use common::xls_fixture_builder::{self as xls, Version};

#[test]
fn imports_shared_strings_and_styles() {
    let bytes = xls::build_shared_string_workbook().build_xls();
    let result = load_xls_bytes(&bytes, &LoadOptions::default()).expect("load xls");

    assert_eq!(result.biff_version, BiffVersion::Biff8);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let sheet = result.workbook.sheet_by_name("Data").expect("Data missing");
    let a1 = sheet.get_cell(0, 0).expect("A1");
    assert_eq!(a1.value, CellValue::String("Beta".to_owned()));
    assert_eq!(
        sheet.get_cell(0, 1).map(|c| &c.value),
        Some(&CellValue::Float(2.5))
    );

    let format = result.workbook.format(a1.format_id).expect("A1 format");
    assert_eq!(format.font().font_size(), 12.0);
    assert_eq!(format.font().font_family(), "Arial");
    assert_eq!(format.value_format(), "General");
}

#[test]
fn imports_cell_formula_text_and_cached_value() {
    let mut rgce = xls::ptg_ref(0, 0);
    rgce.extend_from_slice(&[0x1E, 2, 0]); // PtgInt 2
    rgce.push(0x05); // PtgMul

    let mut sheet = Vec::new();
    xls::push_record(&mut sheet, xls::RECORD_NUMBER, &xls::number(0, 0, 0, 2.5));
    xls::push_record(&mut sheet, xls::RECORD_FORMULA, &xls::formula(0, 1, 0, 5.0, &rgce));
    let bytes = xls::WorkbookBuilder::biff8()
        .sheet("Calc", sheet)
        .build_xls();

    let result = load_xls_bytes(&bytes, &LoadOptions::default()).expect("load xls");
    let sheet = result.workbook.sheet_by_name("Calc").expect("Calc missing");
    let b1 = sheet.get_cell(1, 0).expect("B1");
    assert_eq!(b1.formula.as_deref(), Some("A1*2"));
    assert_eq!(b1.value, CellValue::Float(5.0));
}

#[test]
fn merged_cells_span_anchor_and_cover_the_rest() {
    let v = Version::Biff8;
    let mut sheet = Vec::new();
    xls::push_record(&mut sheet, xls::RECORD_LABEL, &xls::label(v, 0, 0, 0, "Title"));
    xls::push_record(&mut sheet, xls::RECORD_MERGEDCELLS, &xls::merged_cells(&[(0, 1, 0, 2)]));
    let bytes = xls::WorkbookBuilder::biff8().sheet("Merged", sheet).build_xls();

    let result = load_xls_bytes(&bytes, &LoadOptions::default()).expect("load xls");
    let sheet = &result.workbook.sheets[0];
    let anchor = sheet.get_cell(0, 0).expect("anchor");
    assert_eq!((anchor.column_span, anchor.row_span), (3, 2));
    assert!(!anchor.covered);
    assert!(sheet.get_cell(2, 1).expect("C2").covered);
}

#[test]
fn sheets_follow_boundsheet_order_and_window1_sets_active_tab() {
    let v = Version::Biff8;
    let mut first = Vec::new();
    xls::push_record(&mut first, xls::RECORD_LABEL, &xls::label(v, 0, 0, 0, "one"));
    let mut second = Vec::new();
    xls::push_record(&mut second, xls::RECORD_LABEL, &xls::label(v, 0, 0, 0, "two"));

    let bytes = xls::WorkbookBuilder::biff8()
        .global(xls::RECORD_WINDOW1, &xls::window1(1))
        .sheet("First", first)
        .sheet("Second", second)
        .build_xls();

    let result = load_xls_bytes(&bytes, &LoadOptions::default()).expect("load xls");
    let names: Vec<_> = result.workbook.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["First", "Second"]);
    assert_eq!(result.workbook.active_tab, 1);
    assert_eq!(
        result.workbook.sheets[1].get_cell(0, 0).and_then(|c| c.value.as_text()),
        Some("two")
    );
}

#[test]
fn raw_stream_and_compound_file_load_the_same_workbook() {
    let builder = xls::build_shared_string_workbook();
    let from_cfb = load_xls_bytes(&builder.build_xls(), &LoadOptions::default()).expect("cfb");
    let from_stream =
        load_xls_bytes(&builder.build_stream(), &LoadOptions::default()).expect("stream");
    assert_eq!(from_cfb.workbook, from_stream.workbook);
}

#[test]
fn loading_twice_gives_equal_workbooks() {
    let bytes = xls::build_shared_string_workbook().build_xls();
    let first = load_xls_bytes(&bytes, &LoadOptions::default()).expect("first load");
    let second = load_xls_bytes(&bytes, &LoadOptions::default()).expect("second load");
    assert_eq!(first.workbook, second.workbook);
    assert_eq!(first.warnings, second.warnings);
}

#[test]
fn loads_from_path() {
    let bytes = xls::build_shared_string_workbook().build_xls();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("shared.xls");
    std::fs::write(&path, &bytes).expect("write xls");

    let result = load_xls_path(&path, &LoadOptions::default()).expect("load xls");
    assert_eq!(result.workbook.sheet_count(), 1);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = load_xls_path(dir.path().join("absent.xls"), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, LoadError::Io(_)), "{err:?}");
}

#[test]
fn rejects_non_biff_input() {
    let err = load_xls_bytes(b"PK\x03\x04 not a workbook", &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, LoadError::NotBiff), "{err:?}");
}

#[test]
fn compound_file_without_workbook_stream_is_rejected() {
    let bytes = xls::wrap_in_cfb("Contents", b"\x09\x08\x00\x00");
    let err = load_xls_bytes(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, LoadError::MissingWorkbookStream), "{err:?}");
}
