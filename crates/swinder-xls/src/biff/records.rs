use std::borrow::Cow;

use thiserror::Error;

use super::encryption::{self, Decryptor};

/// BIFF `CONTINUE` record id.
pub(crate) const RECORD_CONTINUE: u16 = 0x003C;
/// BIFF `EOF` record id.
pub(crate) const RECORD_EOF: u16 = 0x000A;
/// BIFF `FILEPASS` record id.
///
/// Record headers stay plaintext in an encrypted stream; payload bytes after FILEPASS are
/// encrypted (see [`super::encryption`]).
pub(crate) const RECORD_FILEPASS: u16 = 0x002F;
/// BIFF8 `BOF` record id.
pub(crate) const RECORD_BOF_BIFF8: u16 = 0x0809;
/// BIFF5 `BOF` record id.
pub(crate) const RECORD_BOF_BIFF5: u16 = 0x0009;
/// `BOUNDSHEET`: only the first 4 bytes (the substream offset) stay plaintext when encrypted.
pub(crate) const RECORD_BOUNDSHEET: u16 = 0x0085;
/// `MSODRAWINGGROUP`: consecutive records form one logical Escher blob.
pub(crate) const RECORD_MSODRAWINGGROUP: u16 = 0x00EB;

// Hard caps for coalescing CONTINUE records into a single logical record. Hostile streams can
// carry huge runs of CONTINUE records that would otherwise grow the merged payload without bound.
#[cfg(not(test))]
pub(crate) const MAX_LOGICAL_RECORD_BYTES: usize = 16 * 1024 * 1024;
#[cfg(test)]
pub(crate) const MAX_LOGICAL_RECORD_BYTES: usize = 1024;

// Includes the initial fragment.
#[cfg(not(test))]
pub(crate) const MAX_LOGICAL_RECORD_FRAGMENTS: usize = 4096;
#[cfg(test)]
pub(crate) const MAX_LOGICAL_RECORD_FRAGMENTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("truncated BIFF record header at offset {offset}")]
    TruncatedHeader { offset: usize },
    #[error("BIFF record 0x{id:04X} at offset {offset} extends past end of stream (len={len})")]
    PastEnd { id: u16, offset: usize, len: usize },
    #[error("logical BIFF record 0x{id:04X} at offset {offset} exceeds max continued size ({cap} bytes)")]
    TooLarge { id: u16, offset: usize, cap: usize },
    #[error("logical BIFF record 0x{id:04X} at offset {offset} exceeds max continued fragments ({cap} fragments)")]
    TooManyFragments { id: u16, offset: usize, cap: usize },
}

pub(crate) fn is_bof_record(record_id: u16) -> bool {
    record_id == RECORD_BOF_BIFF8 || record_id == RECORD_BOF_BIFF5
}

/// Read a single physical BIFF record at `offset` without decrypting it.
pub(crate) fn read_biff_record(workbook_stream: &[u8], offset: usize) -> Option<(u16, &[u8])> {
    let header = physical_header(workbook_stream, offset).ok()?;
    Some((header.id, workbook_stream.get(header.data_start..header.data_end)?))
}

#[derive(Debug, Clone, Copy)]
struct PhysicalHeader {
    id: u16,
    data_start: usize,
    data_end: usize,
}

fn physical_header(stream: &[u8], offset: usize) -> Result<PhysicalHeader, FramingError> {
    let truncated = FramingError::TruncatedHeader { offset };
    let header = offset
        .checked_add(4)
        .and_then(|end| stream.get(offset..end))
        .ok_or(truncated)?;
    let id = u16::from_le_bytes([header[0], header[1]]);
    let len = u16::from_le_bytes([header[2], header[3]]) as usize;

    let data_start = offset + 4;
    let data_end = data_start + len;
    if data_end > stream.len() {
        return Err(FramingError::PastEnd {
            id,
            offset,
            len: stream.len(),
        });
    }
    Ok(PhysicalHeader {
        id,
        data_start,
        data_end,
    })
}

/// A logical BIFF record: one physical record plus any CONTINUE fragments that followed it.
#[derive(Debug, Clone)]
pub(crate) struct LogicalRecord<'a> {
    /// Byte offset of the first physical record header in the stream.
    pub(crate) offset: usize,
    pub(crate) id: u16,
    /// Merged (and, when the stream is encrypted, decrypted) payload.
    pub(crate) data: Cow<'a, [u8]>,
    /// Offsets within `data` where each appended fragment starts.
    pub(crate) continue_positions: Vec<usize>,
}

impl LogicalRecord<'_> {
    pub(crate) fn size(&self) -> usize {
        self.data.len()
    }
}

/// Frames a workbook stream into logical records.
///
/// Decryption is switched on by [`RecordReader::set_decryptor`] once the caller has verified a
/// FILEPASS record; it applies to every physical record read afterwards.
pub(crate) struct RecordReader<'a> {
    stream: &'a [u8],
    offset: usize,
    decryptor: Option<Decryptor>,
    finished: bool,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(stream: &'a [u8]) -> Self {
        Self {
            stream,
            offset: 0,
            decryptor: None,
            finished: false,
        }
    }

    pub(crate) fn set_decryptor(&mut self, decryptor: Option<Decryptor>) {
        self.decryptor = decryptor;
    }

    fn payload(&self, header_offset: usize, header: PhysicalHeader) -> Cow<'a, [u8]> {
        let raw = &self.stream[header.data_start..header.data_end];
        let Some(decryptor) = &self.decryptor else {
            return Cow::Borrowed(raw);
        };
        if encryption::is_never_encrypted_record(header.id) {
            return Cow::Borrowed(raw);
        }

        let plaintext_prefix = if header.id == RECORD_BOUNDSHEET {
            raw.len().min(4)
        } else {
            0
        };
        let mut buf = raw.to_vec();
        decryptor.decrypt_at(
            &mut buf[plaintext_prefix..],
            header_offset + 4 + plaintext_prefix,
        );
        Cow::Owned(buf)
    }

    fn continues(&self, record_id: u16, next_id: u16) -> bool {
        next_id == RECORD_CONTINUE
            || (record_id == RECORD_MSODRAWINGGROUP && next_id == RECORD_MSODRAWINGGROUP)
    }

    fn fail(&mut self, err: FramingError) -> Option<Result<LogicalRecord<'a>, FramingError>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<LogicalRecord<'a>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished || self.offset >= self.stream.len() {
                return None;
            }

            let start_offset = self.offset;
            let first = match physical_header(self.stream, start_offset) {
                Ok(header) => header,
                Err(err) => return self.fail(err),
            };
            self.offset = first.data_end;

            // Filler.
            if first.id == 0 {
                continue;
            }

            let mut data = self.payload(start_offset, first);
            let mut continue_positions = Vec::new();

            // Headers are plaintext, so peeking at the next one is safe before deciding to merge.
            while let Ok(next) = physical_header(self.stream, self.offset) {
                if !self.continues(first.id, next.id) {
                    break;
                }

                let cap = MAX_LOGICAL_RECORD_BYTES;
                let fragment_len = next.data_end - next.data_start;
                if data.len().saturating_add(fragment_len) > cap {
                    return self.fail(FramingError::TooLarge {
                        id: first.id,
                        offset: start_offset,
                        cap,
                    });
                }
                let cap = MAX_LOGICAL_RECORD_FRAGMENTS;
                if continue_positions.len() + 1 >= cap {
                    return self.fail(FramingError::TooManyFragments {
                        id: first.id,
                        offset: start_offset,
                        cap,
                    });
                }

                let fragment = self.payload(self.offset, next);
                continue_positions.push(data.len());
                data.to_mut().extend_from_slice(&fragment);
                self.offset = next.data_end;
            }

            return Some(Ok(LogicalRecord {
                offset: start_offset,
                id: first.id,
                data,
                continue_positions,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn iterates_records_with_offsets() {
        let stream = [record(0x0001, &[1, 2, 3]), record(0x0002, &[4])].concat();
        let records: Vec<_> = RecordReader::new(&stream).map(Result::unwrap).collect();

        assert_eq!(records.len(), 2);
        assert_eq!((records[0].offset, records[0].id), (0, 0x0001));
        assert_eq!(records[0].data.as_ref(), &[1, 2, 3]);
        assert_eq!((records[1].offset, records[1].id), (7, 0x0002));
        assert!(records[1].continue_positions.is_empty());
    }

    #[test]
    fn merges_continue_fragments_and_records_boundaries() {
        let stream = [
            record(0x00FC, &[1, 2]),
            record(RECORD_CONTINUE, &[3]),
            record(RECORD_CONTINUE, &[4, 5]),
            record(0x00BB, &[9]),
        ]
        .concat();

        let mut reader = RecordReader::new(&stream);
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.id, 0x00FC);
        assert_eq!(first.data.as_ref(), &[1, 2, 3, 4, 5]);
        assert_eq!(first.size(), 5);
        assert_eq!(first.continue_positions, vec![2, 3]);

        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.id, 0x00BB);
        assert!(reader.next().is_none());
    }

    #[test]
    fn chains_drawing_group_records() {
        let stream = [
            record(RECORD_MSODRAWINGGROUP, &[1]),
            record(RECORD_MSODRAWINGGROUP, &[2]),
            record(RECORD_CONTINUE, &[3]),
            record(RECORD_EOF, &[]),
        ]
        .concat();

        let mut reader = RecordReader::new(&stream);
        let group = reader.next().unwrap().unwrap();
        assert_eq!(group.data.as_ref(), &[1, 2, 3]);
        assert_eq!(group.continue_positions, vec![1, 2]);
        assert_eq!(reader.next().unwrap().unwrap().id, RECORD_EOF);
    }

    #[test]
    fn skips_filler_records() {
        let stream = [record(0x0000, &[0, 0]), record(0x0002, &[7])].concat();
        let ids: Vec<u16> = RecordReader::new(&stream).map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec![0x0002]);
    }

    #[test]
    fn truncated_header_ends_iteration_with_error() {
        let stream = [record(0x0001, &[1]), vec![0x02, 0x00, 0x01]].concat();
        let mut reader = RecordReader::new(&stream);
        assert!(reader.next().unwrap().is_ok());
        assert_eq!(
            reader.next().unwrap().unwrap_err(),
            FramingError::TruncatedHeader { offset: 5 }
        );
        assert!(reader.next().is_none());
    }

    #[test]
    fn payload_past_end_of_stream_is_an_error() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&0x0001u16.to_le_bytes());
        stream.extend_from_slice(&4u16.to_le_bytes());
        stream.extend_from_slice(&[1, 2]);

        let err = RecordReader::new(&stream).next().unwrap().unwrap_err();
        assert_eq!(
            err,
            FramingError::PastEnd {
                id: 0x0001,
                offset: 0,
                len: 6
            }
        );
    }

    #[test]
    fn oversized_continued_record_is_rejected() {
        let mut parts = vec![record(0x00FC, &[0u8; 1])];
        let chunk = vec![0u8; 64];
        let mut total = 1;
        while total <= MAX_LOGICAL_RECORD_BYTES {
            parts.push(record(RECORD_CONTINUE, &chunk));
            total += chunk.len();
        }
        let stream = parts.concat();

        let mut reader = RecordReader::new(&stream);
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, FramingError::TooLarge { id: 0x00FC, .. }), "{err}");
        assert!(reader.next().is_none());
    }

    #[test]
    fn excessive_continue_fragments_are_rejected() {
        let mut parts = vec![record(0x00FC, &[])];
        for _ in 0..=MAX_LOGICAL_RECORD_FRAGMENTS {
            parts.push(record(RECORD_CONTINUE, &[]));
        }
        let stream = parts.concat();

        let err = RecordReader::new(&stream).next().unwrap().unwrap_err();
        assert!(err.to_string().contains("max continued fragments"), "{err}");
    }

    #[test]
    fn read_biff_record_does_not_require_full_iteration() {
        let stream = record(RECORD_BOF_BIFF8, &[0, 6, 5, 0]);
        assert_eq!(
            read_biff_record(&stream, 0),
            Some((RECORD_BOF_BIFF8, &[0u8, 6, 5, 0][..]))
        );
        assert_eq!(read_biff_record(&stream, 3), None);
    }
}
