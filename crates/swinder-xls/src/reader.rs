//! Record loop: frames the workbook stream and drives the BOF/EOF handler stack.

use std::sync::atomic::Ordering;

use swinder_model::{Sheet, Workbook};

use crate::biff::encryption::{Decryptor, FilePass, DEFAULT_PASSWORD};
use crate::biff::parsers::globals::{Bof, SubstreamKind};
use crate::biff::records::{LogicalRecord, RecordReader};
use crate::biff::registry::{self, Record};
use crate::biff::{BiffVersion, DecryptError};
use crate::chart::ChartHandler;
use crate::globals::Globals;
use crate::warnings::Warnings;
use crate::worksheet::{SheetEnv, WorksheetHandler};
use crate::{EncryptionStatus, LoadError, LoadOptions, LoadResult};

/// Handler for one open substream.
enum Handler {
    Globals,
    Worksheet(WorksheetHandler),
    Chart(ChartHandler),
    /// Substreams nothing is read from (macro sheets, VBA modules, workspaces).
    Ignore,
}

pub(crate) struct WorkbookReader<'a> {
    records: RecordReader<'a>,
    options: &'a LoadOptions,
    version: BiffVersion,
    globals: Globals,
    workbook: Workbook,
    warnings: Warnings,
    stack: Vec<Handler>,
    encryption: EncryptionStatus,
}

impl<'a> WorkbookReader<'a> {
    pub(crate) fn new(stream: &'a [u8], version: BiffVersion, options: &'a LoadOptions) -> Self {
        Self {
            records: RecordReader::new(stream),
            options,
            version,
            globals: Globals::new(version),
            workbook: Workbook::new(),
            warnings: Warnings::new(options.max_warnings),
            stack: Vec::new(),
            encryption: EncryptionStatus::default(),
        }
    }

    pub(crate) fn run(mut self) -> Result<LoadResult, LoadError> {
        while let Some(next) = self.records.next() {
            if self.is_cancelled() {
                return Err(LoadError::Cancelled);
            }
            match next {
                Ok(record) => self.dispatch(&record),
                Err(err) => {
                    self.warnings.push(format!("stopped reading workbook stream: {err}"));
                    break;
                }
            }
        }
        Ok(self.finish())
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn dispatch(&mut self, logical: &LogicalRecord<'_>) {
        let record = registry::decode(logical, self.globals.decode_context());
        match record {
            Record::Bof(bof) => self.begin_substream(logical.offset, bof),
            Record::Eof => self.end_substream(),
            Record::FilePass(filepass) => self.file_pass(filepass),
            Record::Unknown { id } => {
                log::debug!("skipping unknown record 0x{id:04X} at offset {}", logical.offset);
            }
            record => match self.stack.last_mut() {
                Some(Handler::Globals) => {
                    self.globals
                        .handle(record, &mut self.workbook, &mut self.warnings);
                }
                Some(Handler::Worksheet(handler)) => {
                    let mut env = SheetEnv {
                        globals: &mut self.globals,
                        workbook: &mut self.workbook,
                        warnings: &mut self.warnings,
                    };
                    handler.handle(record, &mut env);
                }
                Some(Handler::Chart(handler)) => {
                    handler.handle(record, &self.globals, &mut self.warnings);
                }
                Some(Handler::Ignore) => {}
                None => log::debug!(
                    "record 0x{:04X} at offset {} outside any substream",
                    logical.id,
                    logical.offset
                ),
            },
        }
    }

    fn begin_substream(&mut self, offset: usize, bof: Bof) {
        log::debug!("BOF {:?} at offset {offset}", bof.kind);
        let handler = match bof.kind {
            SubstreamKind::Workbook => Handler::Globals,
            SubstreamKind::Worksheet => {
                let sheet = match self.globals.sheet_for_bof(offset) {
                    Some(sheet) => sheet,
                    None => {
                        log::debug!("worksheet at offset {offset} has no BOUNDSHEET entry");
                        self.workbook.add_sheet(Sheet::new(""))
                    }
                };
                Handler::Worksheet(WorksheetHandler::new(sheet))
            }
            SubstreamKind::Chart => {
                let sheet = self
                    .globals
                    .sheet_for_bof(offset)
                    .or_else(|| self.enclosing_sheet());
                Handler::Chart(ChartHandler::new(sheet))
            }
            SubstreamKind::VbModule
            | SubstreamKind::MacroSheet
            | SubstreamKind::Workspace
            | SubstreamKind::Other(_) => Handler::Ignore,
        };
        self.stack.push(handler);
    }

    /// Sheet of the innermost open worksheet substream, for embedded charts.
    fn enclosing_sheet(&self) -> Option<usize> {
        self.stack.iter().rev().find_map(|handler| match handler {
            Handler::Worksheet(worksheet) => Some(worksheet.sheet()),
            _ => None,
        })
    }

    fn end_substream(&mut self) {
        let Some(handler) = self.stack.pop() else {
            log::debug!("EOF with no open substream");
            return;
        };
        self.close(handler);
    }

    fn close(&mut self, handler: Handler) {
        match handler {
            Handler::Worksheet(worksheet) => {
                let mut env = SheetEnv {
                    globals: &mut self.globals,
                    workbook: &mut self.workbook,
                    warnings: &mut self.warnings,
                };
                worksheet.finish(&mut env);
            }
            Handler::Chart(chart) => chart.finish(&mut self.workbook, &mut self.warnings),
            Handler::Globals | Handler::Ignore => {}
        }
    }

    fn file_pass(&mut self, filepass: Result<FilePass, DecryptError>) {
        self.encryption.password_protected = true;
        let filepass = match filepass {
            Ok(filepass) => filepass,
            Err(err) => {
                self.encryption.encryption_type_supported = false;
                self.warnings
                    .push(format!("workbook is encrypted ({err}); reading payloads as stored"));
                return;
            }
        };

        let password = self.options.password.as_deref().map_or(DEFAULT_PASSWORD, |p| p.as_str());
        match Decryptor::new(&filepass, password) {
            Ok(decryptor) => {
                log::debug!("decrypting {} workbook stream", filepass.describe());
                self.records.set_decryptor(Some(decryptor));
            }
            Err(DecryptError::UnsupportedEncryption(scheme)) => {
                self.encryption.encryption_type_supported = false;
                self.warnings.push(format!(
                    "workbook uses unsupported encryption ({scheme}); reading payloads as stored"
                ));
            }
            Err(err) => {
                self.warnings.push(format!(
                    "cannot decrypt {} workbook: {err}; reading payloads as stored",
                    filepass.describe()
                ));
            }
        }
    }

    fn finish(mut self) -> LoadResult {
        while let Some(handler) = self.stack.pop() {
            if !matches!(handler, Handler::Globals | Handler::Ignore) {
                self.warnings
                    .push("workbook stream ended inside an open substream");
            }
            self.close(handler);
        }
        self.workbook.colors = self.globals.palette().to_vec();
        let drawing_group = self.globals.drawing_group().len();
        if drawing_group > 0 {
            log::debug!("workbook drawing group holds {drawing_group} bytes");
        }

        LoadResult {
            workbook: self.workbook,
            warnings: self.warnings.into_vec(),
            encryption: self.encryption,
            biff_version: self.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::encryption::tests::legacy_rc4_filepass;
    use crate::biff::encryption::{is_never_encrypted_record, parse_filepass};
    use crate::biff::records::RECORD_BOUNDSHEET;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use swinder_model::CellValue;

    const BOF: u16 = 0x0809;
    const EOF: u16 = 0x000A;
    const FILEPASS: u16 = 0x002F;
    const SST: u16 = 0x00FC;
    const LABELSST: u16 = 0x00FD;
    const CHART: u16 = 0x1002;

    fn record(out: &mut Vec<u8>, id: u16, payload: &[u8]) {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
    }

    fn bof(dt: u16) -> Vec<u8> {
        let mut out = vec![0u8; 16];
        out[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
        out[2..4].copy_from_slice(&dt.to_le_bytes());
        out
    }

    fn boundsheet(position: u32, name: &str) -> Vec<u8> {
        let mut out = position.to_le_bytes().to_vec();
        out.extend_from_slice(&[0, 0, name.len() as u8, 0]);
        out.extend_from_slice(name.as_bytes());
        out
    }

    fn sst(text: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(text.len() as u16).to_le_bytes());
        out.push(0);
        out.extend_from_slice(text.as_bytes());
        out
    }

    fn labelsst(row: u16, col: u16, index: u32) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [row, col, 0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&index.to_le_bytes());
        out
    }

    /// Globals (optionally carrying `filepass`) plus one sheet named `Secret` whose A1 is SST 0.
    fn single_sheet_stream(filepass: Option<&[u8]>, text: &str) -> Vec<u8> {
        let mut globals = Vec::new();
        record(&mut globals, BOF, &bof(0x0005));
        if let Some(filepass) = filepass {
            record(&mut globals, FILEPASS, filepass);
        }
        record(&mut globals, SST, &sst(text));
        let sheet_offset = globals.len() + 4 + boundsheet(0, "Secret").len() + 4;
        record(
            &mut globals,
            RECORD_BOUNDSHEET,
            &boundsheet(sheet_offset as u32, "Secret"),
        );
        record(&mut globals, EOF, &[]);
        assert_eq!(globals.len(), sheet_offset);

        record(&mut globals, BOF, &bof(0x0010));
        record(&mut globals, LABELSST, &labelsst(0, 0, 0));
        record(&mut globals, EOF, &[]);
        globals
    }

    /// Encrypt every payload after FILEPASS in place, the way a writer lays the stream out.
    fn encrypt_after_filepass(stream: &mut [u8], decryptor: &Decryptor) {
        let mut offset = 0;
        let mut encrypting = false;
        while offset + 4 <= stream.len() {
            let id = u16::from_le_bytes([stream[offset], stream[offset + 1]]);
            let len = u16::from_le_bytes([stream[offset + 2], stream[offset + 3]]) as usize;
            let start = offset + 4;
            if encrypting && !is_never_encrypted_record(id) {
                let skip = if id == RECORD_BOUNDSHEET { 4 } else { 0 };
                decryptor.decrypt_at(&mut stream[start + skip..start + len], start + skip);
            }
            if id == FILEPASS {
                encrypting = true;
            }
            offset = start + len;
        }
    }

    fn encrypted_stream(password: &str) -> Vec<u8> {
        let filepass = legacy_rc4_filepass(password, &[0x5A; 16]);
        let mut stream = single_sheet_stream(Some(filepass.as_slice()), "top secret");
        let parsed = parse_filepass(BiffVersion::Biff8, &filepass).unwrap();
        let decryptor = Decryptor::new(&parsed, password).unwrap();
        encrypt_after_filepass(&mut stream, &decryptor);
        stream
    }

    fn run(stream: &[u8], options: &LoadOptions) -> LoadResult {
        WorkbookReader::new(stream, BiffVersion::Biff8, options)
            .run()
            .unwrap()
    }

    #[test]
    fn plain_stream_maps_boundsheet_to_substream() {
        let stream = single_sheet_stream(None, "hello");
        let result = run(&stream, &LoadOptions::default());

        assert_eq!(result.warnings, Vec::new());
        assert_eq!(result.encryption, EncryptionStatus::default());
        assert_eq!(result.workbook.sheet_count(), 1);
        let sheet = &result.workbook.sheets[0];
        assert_eq!(sheet.name, "Secret");
        assert_eq!(
            sheet.get_cell(0, 0).map(|c| &c.value),
            Some(&CellValue::String("hello".to_string()))
        );
    }

    #[test]
    fn decrypts_rc4_with_default_password() {
        let stream = encrypted_stream(DEFAULT_PASSWORD);
        let result = run(&stream, &LoadOptions::default());

        assert_eq!(
            result.encryption,
            EncryptionStatus {
                password_protected: true,
                encryption_type_supported: true,
            }
        );
        assert_eq!(result.warnings, Vec::new());
        let sheet = &result.workbook.sheets[0];
        assert_eq!(sheet.name, "Secret");
        assert_eq!(
            sheet.get_cell(0, 0).and_then(|c| c.value.as_text()),
            Some("top secret")
        );
    }

    #[test]
    fn decrypts_rc4_with_caller_password() {
        let stream = encrypted_stream("hunter2");
        let options = LoadOptions::new().with_password("hunter2");
        let result = run(&stream, &options);

        assert!(result.encryption.password_protected);
        assert_eq!(
            result.workbook.sheets[0]
                .get_cell(0, 0)
                .and_then(|c| c.value.as_text()),
            Some("top secret")
        );
    }

    #[test]
    fn wrong_password_warns_and_keeps_going() {
        let stream = encrypted_stream("hunter2");
        let result = run(&stream, &LoadOptions::default());

        assert!(result.encryption.password_protected);
        assert!(result.encryption.encryption_type_supported);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("wrong password")));
        // The sheet substream is still read, just with undecrypted payloads.
        assert_eq!(result.workbook.sheet_count(), 1);
    }

    #[test]
    fn embedded_chart_attaches_to_enclosing_sheet() {
        let mut stream = Vec::new();
        record(&mut stream, BOF, &bof(0x0010));
        record(&mut stream, BOF, &bof(0x0020));
        let mut rect = Vec::new();
        for v in [0u32, 0, 100 << 16, 50 << 16] {
            rect.extend_from_slice(&v.to_le_bytes());
        }
        record(&mut stream, CHART, &rect);
        record(&mut stream, EOF, &[]);
        record(&mut stream, EOF, &[]);

        let result = run(&stream, &LoadOptions::default());
        assert_eq!(result.workbook.sheet_count(), 1);
        let charts = &result.workbook.sheets[0].charts;
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].width, 100.0);
        assert_eq!(charts[0].height, 50.0);
    }

    #[test]
    fn unterminated_substream_is_closed_with_warning() {
        let mut stream = Vec::new();
        record(&mut stream, BOF, &bof(0x0010));
        record(&mut stream, LABELSST, &labelsst(0, 0, 0));

        let result = run(&stream, &LoadOptions::default());
        assert_eq!(result.workbook.sheet_count(), 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("open substream")));
    }

    #[test]
    fn truncated_record_stops_reading_with_warning() {
        let mut stream = single_sheet_stream(None, "hello");
        // Header claims more payload than the stream holds.
        stream.extend_from_slice(&[0x03, 0x02, 0xFF, 0x00, 0x01]);

        let result = run(&stream, &LoadOptions::default());
        assert_eq!(result.workbook.sheet_count(), 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.starts_with("stopped reading workbook stream")));
    }

    #[test]
    fn cancel_flag_aborts_the_load() {
        let stream = single_sheet_stream(None, "hello");
        let options = LoadOptions::new().with_cancel_flag(Arc::new(AtomicBool::new(true)));
        let err = WorkbookReader::new(&stream, BiffVersion::Biff8, &options)
            .run()
            .unwrap_err();
        assert!(matches!(err, LoadError::Cancelled));
    }
}
