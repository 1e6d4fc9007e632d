//! On-disk format of the reference collection.
//!
//! A small header carries the cutoff setting, followed by fixed 30-byte
//! records. Records for the same canonical board may repeat; the loader
//! merges them, so appending an updated record is enough to persist a
//! change without rewriting the file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;

use super::board::{ReferenceBoard, LOOKUPS};
use super::moves::ReferenceMoves;

const MAGIC: [u8; 4] = *b"FREF";
const VERSION: u8 = 1;
const RECORD_SIZE: usize = 30;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reference store is corrupt: {0}")]
    Corrupt(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything a reference file holds.
pub(crate) struct StoredCollection {
    pub cutoff_seconds: u32,
    pub entries: Vec<(ReferenceBoard, ReferenceMoves)>,
}

/// Reads a whole reference file.
///
/// # Errors
///
/// [`StoreError::Corrupt`] when the header or a record does not decode;
/// I/O errors pass through. Callers fall back to the seed collection on
/// either.
pub(crate) fn load(path: &Path) -> Result<StoredCollection, StoreError> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut header = [0u8; 9];
    reader.read_exact(&mut header)?;
    if header[..4] != MAGIC {
        return Err(StoreError::Corrupt("bad magic bytes"));
    }
    if header[4] != VERSION {
        return Err(StoreError::Corrupt("unsupported version"));
    }
    let cutoff_seconds = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);

    let mut entries: Vec<(ReferenceBoard, ReferenceMoves)> = Vec::new();
    let mut record = [0u8; RECORD_SIZE];
    loop {
        match reader.read_exact(&mut record) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        }
        entries.push(decode_record(&record)?);
    }

    Ok(StoredCollection {
        cutoff_seconds,
        entries,
    })
}

/// Replaces the file with a header and the given records.
pub(crate) fn rewrite_all<'a>(
    path: &Path,
    cutoff_seconds: u32,
    entries: impl Iterator<Item = (&'a ReferenceBoard, &'a ReferenceMoves)>,
) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&MAGIC)?;
    writer.write_all(&[VERSION])?;
    writer.write_all(&cutoff_seconds.to_le_bytes())?;
    for (board, moves) in entries {
        writer.write_all(&encode_record(board, moves))?;
    }
    writer.flush()
}

/// Appends one record; the loader's merge step resolves duplicates.
pub(crate) fn append(path: &Path, board: &ReferenceBoard, moves: &ReferenceMoves) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(&encode_record(board, moves))
}

fn encode_record(board: &ReferenceBoard, moves: &ReferenceMoves) -> [u8; RECORD_SIZE] {
    let mut record = [0u8; RECORD_SIZE];
    record[..8].copy_from_slice(&board.transform_key().to_le_bytes());
    record[8] = board.group();
    record[9..13].copy_from_slice(&board.hash_high().to_le_bytes());
    record[13..17].copy_from_slice(&board.hash_low().to_le_bytes());
    record[17..21].copy_from_slice(moves.steps());
    for (index, prefix) in moves.prefixes().iter().enumerate() {
        let at = 21 + index * 2;
        record[at..at + 2].copy_from_slice(&prefix.to_le_bytes());
    }
    record[29] = moves.status();
    record
}

fn decode_record(record: &[u8; RECORD_SIZE]) -> Result<(ReferenceBoard, ReferenceMoves), StoreError> {
    let transform_key = u64::from_le_bytes(record[..8].try_into().map_err(|_| io_size())?);
    let group = record[8];
    let hash_high = u32::from_le_bytes(record[9..13].try_into().map_err(|_| io_size())?);
    let hash_low = u32::from_le_bytes(record[13..17].try_into().map_err(|_| io_size())?);
    let board = ReferenceBoard::from_stored(transform_key, group, hash_high, hash_low)
        .ok_or(StoreError::Corrupt("invalid canonical board record"))?;

    let mut steps = [0u8; LOOKUPS];
    steps.copy_from_slice(&record[17..21]);
    let mut prefixes = [0u16; LOOKUPS];
    for (index, prefix) in prefixes.iter_mut().enumerate() {
        let at = 21 + index * 2;
        *prefix = u16::from_le_bytes([record[at], record[at + 1]]);
    }
    let status = record[29];
    if status > 0b1111 {
        return Err(StoreError::Corrupt("invalid status bits"));
    }
    Ok((board, ReferenceMoves::from_stored(steps, prefixes, status)))
}

const fn io_size() -> StoreError {
    StoreError::Corrupt("record slice size mismatch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifteen_core::{Board, Direction};
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{name}-{}.ref", std::process::id()))
    }

    #[test]
    fn round_trips_entries() {
        fastrand::seed(5);
        let mut entries = Vec::new();
        for lookup in 0..4u8 {
            let board = ReferenceBoard::new(&Board::random());
            let mut moves = ReferenceMoves::seeded(lookup, 66);
            moves.set_solution(
                usize::from(lookup),
                66,
                &[Direction::Left; 9],
                false,
            );
            entries.push((board, moves));
        }

        let path = temp_path("round-trip");
        rewrite_all(&path, 7, entries.iter().map(|(b, m)| (b, m))).unwrap();
        let stored = load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(stored.cutoff_seconds, 7);
        assert_eq!(stored.entries.len(), entries.len());
        for ((board, moves), (loaded_board, loaded_moves)) in
            entries.iter().zip(&stored.entries)
        {
            assert_eq!(board, loaded_board);
            assert_eq!(moves, loaded_moves);
        }
    }

    #[test]
    fn appended_records_survive_reload() {
        let path = temp_path("append");
        rewrite_all(&path, 10, std::iter::empty()).unwrap();

        fastrand::seed(17);
        let board = ReferenceBoard::new(&Board::random());
        let moves = ReferenceMoves::seeded(0, 58);
        append(&path, &board, &moves).unwrap();

        let stored = load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(stored.entries.len(), 1);
        assert_eq!(stored.entries[0].0, board);
    }

    #[test]
    fn truncated_file_reports_corruption() {
        let path = temp_path("truncated");
        std::fs::write(&path, b"FREF").unwrap();
        let result = load(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn garbage_record_reports_corruption() {
        let path = temp_path("garbage");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"FREF");
        bytes.push(1);
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; RECORD_SIZE]);
        std::fs::write(&path, &bytes).unwrap();
        let result = load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }
}
