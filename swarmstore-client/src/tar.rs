//! Collection archive assembly
//!
//! Single-pass POSIX ustar writer producing the uncompressed archive body
//! for multi-file collection uploads. One writer instance is driven by one
//! logical sequence of writes — it is not safe for concurrent writers —
//! and the finished buffer is handed to the upload operation exactly once.

use bytes::{BufMut, Bytes, BytesMut};
use swarmstore_core::{Result, SwarmstoreError};
use tokio::io::{AsyncRead, AsyncReadExt};

const BLOCK_SIZE: usize = 512;
/// Bounded copy buffer for draining item streams; large files never get
/// read into memory in a single shot.
const COPY_BUFFER_SIZE: usize = 32 * 1024;

const ENTRY_MODE: u64 = 0o777;
const NAME_LEN: usize = 100;
/// Largest size the 12-byte octal size field can frame (11 digits)
const MAX_ENTRY_SIZE: u64 = 0o77777777777;

/// One file to be placed into a collection archive
pub struct CollectionItem {
    /// Member path inside the archive
    pub path: String,

    /// Declared size in bytes; the header is written from this value and
    /// the stream must supply exactly this many bytes
    pub size: u64,

    /// Byte stream supplying the member contents. Ownership passes to the
    /// writer for the duration of the write, which drops (closes) it
    /// whether or not the write succeeds.
    pub data: Option<Box<dyn AsyncRead + Send + Unpin>>,
}

impl CollectionItem {
    pub fn new(
        path: impl Into<String>,
        size: u64,
        data: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            data: Some(Box::new(data)),
        }
    }
}

struct OpenEntry {
    declared: u64,
    written: u64,
}

/// Append-only, single-pass archive stream
///
/// `begin_file` / `append_file` / `end_file` frame one member each;
/// [`write_item`](Self::write_item) composes them around a whole
/// [`CollectionItem`]. After [`close`](Self::close) no further writes are
/// permitted and [`into_bytes`](Self::into_bytes) yields the upload body.
pub struct TarStream {
    buf: BytesMut,
    current: Option<OpenEntry>,
    finalized: bool,
}

impl TarStream {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            current: None,
            finalized: false,
        }
    }

    /// Start a new member, writing its 512-byte header
    pub fn begin_file(&mut self, path: &str, size: u64) -> Result<()> {
        if self.finalized {
            return Err(SwarmstoreError::ArchiveFinalized);
        }
        self.close_entry()?;

        let header = build_header(path, size)?;
        self.buf.put_slice(&header);
        self.current = Some(OpenEntry {
            declared: size,
            written: 0,
        });
        Ok(())
    }

    /// Stream payload bytes into the open member
    pub fn append_file(&mut self, data: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(SwarmstoreError::ArchiveFinalized);
        }
        let entry = self.current.as_mut().ok_or(SwarmstoreError::ArchiveEntrySize {
            declared: 0,
            written: data.len() as u64,
        })?;

        let written = entry.written + data.len() as u64;
        if written > entry.declared {
            return Err(SwarmstoreError::ArchiveEntrySize {
                declared: entry.declared,
                written,
            });
        }

        self.buf.put_slice(data);
        entry.written = written;
        Ok(())
    }

    /// Finish the open member, padding it to the 512-byte frame boundary
    pub fn end_file(&mut self) -> Result<()> {
        if self.finalized {
            return Err(SwarmstoreError::ArchiveFinalized);
        }
        self.close_entry()
    }

    /// Finalize the archive with the two terminating zero blocks.
    ///
    /// Closing with zero members written yields the valid empty archive.
    pub fn close(&mut self) -> Result<()> {
        if self.finalized {
            return Err(SwarmstoreError::ArchiveFinalized);
        }
        self.close_entry()?;
        self.buf.put_bytes(0, 2 * BLOCK_SIZE);
        self.finalized = true;
        Ok(())
    }

    /// Write a whole item: header, drained stream, end-of-entry.
    ///
    /// The item's stream is consumed with a bounded copy buffer and is
    /// released on every path, including errors. An item carrying no
    /// stream fails before anything is written.
    pub async fn write_item(&mut self, mut item: CollectionItem) -> Result<()> {
        let mut reader = item.data.take().ok_or(SwarmstoreError::InvalidCollectionItem)?;

        self.begin_file(&item.path, item.size)?;
        let mut copy_buf = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut copy_buf).await?;
            if n == 0 {
                break;
            }
            self.append_file(&copy_buf[..n])?;
        }
        self.end_file()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Consume the finalized archive as an upload request body
    pub fn into_bytes(self) -> Result<Bytes> {
        if !self.finalized {
            return Err(SwarmstoreError::ArchiveNotFinalized);
        }
        Ok(self.buf.freeze())
    }

    // Verifies the open entry received exactly its declared bytes and pads
    // the frame to the block boundary. No-op when no entry is open.
    fn close_entry(&mut self) -> Result<()> {
        if let Some(entry) = self.current.take() {
            if entry.written != entry.declared {
                return Err(SwarmstoreError::ArchiveEntrySize {
                    declared: entry.declared,
                    written: entry.written,
                });
            }
            let remainder = (entry.declared % BLOCK_SIZE as u64) as usize;
            if remainder != 0 {
                self.buf.put_bytes(0, BLOCK_SIZE - remainder);
            }
        }
        Ok(())
    }
}

impl Default for TarStream {
    fn default() -> Self {
        Self::new()
    }
}

// ustar header field offsets.
const NAME_OFFSET: usize = 0;
const MODE_OFFSET: usize = 100;
const UID_OFFSET: usize = 108;
const GID_OFFSET: usize = 116;
const SIZE_OFFSET: usize = 124;
const MTIME_OFFSET: usize = 136;
const CHKSUM_OFFSET: usize = 148;
const TYPEFLAG_OFFSET: usize = 156;
const MAGIC_OFFSET: usize = 257;
const VERSION_OFFSET: usize = 263;

fn build_header(path: &str, size: u64) -> Result<[u8; BLOCK_SIZE]> {
    if path.len() > NAME_LEN {
        return Err(SwarmstoreError::ArchivePathTooLong(path.to_string()));
    }
    if size > MAX_ENTRY_SIZE {
        return Err(SwarmstoreError::ArchiveEntryTooLarge {
            size,
            max: MAX_ENTRY_SIZE,
        });
    }

    let mut header = [0u8; BLOCK_SIZE];
    header[NAME_OFFSET..NAME_OFFSET + path.len()].copy_from_slice(path.as_bytes());

    write_octal(&mut header[MODE_OFFSET..MODE_OFFSET + 8], ENTRY_MODE);
    write_octal(&mut header[UID_OFFSET..UID_OFFSET + 8], 0);
    write_octal(&mut header[GID_OFFSET..GID_OFFSET + 8], 0);
    write_octal(&mut header[SIZE_OFFSET..SIZE_OFFSET + 12], size);
    let mtime = chrono::Utc::now().timestamp().max(0) as u64;
    write_octal(&mut header[MTIME_OFFSET..MTIME_OFFSET + 12], mtime);

    header[TYPEFLAG_OFFSET] = b'0';
    header[MAGIC_OFFSET..MAGIC_OFFSET + 6].copy_from_slice(b"ustar\0");
    header[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(b"00");

    // Checksum is computed with the checksum field itself blanked to spaces.
    header[CHKSUM_OFFSET..CHKSUM_OFFSET + 8].fill(b' ');
    let sum: u32 = header.iter().map(|b| u32::from(*b)).sum();
    let chksum = format!("{sum:06o}\0 ");
    header[CHKSUM_OFFSET..CHKSUM_OFFSET + 8].copy_from_slice(chksum.as_bytes());

    Ok(header)
}

// Octal numeric field: zero-padded digits with a NUL terminator.
fn write_octal(field: &mut [u8], value: u64) {
    let digits = field.len() - 1;
    let s = format!("{value:0digits$o}");
    field[..s.len()].copy_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_octal(field: &[u8]) -> u64 {
        let end = field
            .iter()
            .position(|b| *b == 0 || *b == b' ')
            .unwrap_or(field.len());
        u64::from_str_radix(std::str::from_utf8(&field[..end]).unwrap(), 8).unwrap()
    }

    // Walks the archive block by block, verifying header checksums, and
    // returns (path, size) per member.
    fn parse_members(archive: &[u8]) -> Vec<(String, u64)> {
        assert_eq!(archive.len() % BLOCK_SIZE, 0, "archive not block aligned");
        let mut members = Vec::new();
        let mut offset = 0;
        while offset + BLOCK_SIZE <= archive.len() {
            let block = &archive[offset..offset + BLOCK_SIZE];
            if block.iter().all(|b| *b == 0) {
                break;
            }

            let stored_sum = parse_octal(&block[CHKSUM_OFFSET..CHKSUM_OFFSET + 8]);
            let mut blanked = block.to_vec();
            blanked[CHKSUM_OFFSET..CHKSUM_OFFSET + 8].fill(b' ');
            let computed: u64 = blanked.iter().map(|b| u64::from(*b)).sum();
            assert_eq!(stored_sum, computed, "header checksum mismatch");
            assert_eq!(&block[MAGIC_OFFSET..MAGIC_OFFSET + 6], b"ustar\0");

            let name_end = block[..NAME_LEN].iter().position(|b| *b == 0).unwrap();
            let name = std::str::from_utf8(&block[..name_end]).unwrap().to_string();
            let size = parse_octal(&block[SIZE_OFFSET..SIZE_OFFSET + 12]);
            members.push((name, size));

            let padded = size.div_ceil(BLOCK_SIZE as u64) as usize * BLOCK_SIZE;
            offset += BLOCK_SIZE + padded;
        }
        members
    }

    #[tokio::test]
    async fn test_members_match_declared_items() {
        let mut stream = TarStream::new();
        let files: &[(&str, &[u8])] = &[
            ("index.html", b"<html></html>"),
            ("assets/app.js", &[0xab; 700]),
            ("empty.txt", b""),
        ];
        for (path, data) in files {
            stream
                .write_item(CollectionItem::new(*path, data.len() as u64, *data))
                .await
                .unwrap();
        }
        stream.close().unwrap();

        let archive = stream.into_bytes().unwrap();
        let members = parse_members(&archive);
        assert_eq!(members.len(), files.len());
        for ((path, data), (name, size)) in files.iter().zip(&members) {
            assert_eq!(name, path);
            assert_eq!(*size, data.len() as u64);
        }
    }

    #[tokio::test]
    async fn test_payload_bytes_follow_header() {
        let mut stream = TarStream::new();
        stream
            .write_item(CollectionItem::new("a.txt", 3, &b"abc"[..]))
            .await
            .unwrap();
        stream.close().unwrap();

        let archive = stream.into_bytes().unwrap();
        assert_eq!(&archive[BLOCK_SIZE..BLOCK_SIZE + 3], b"abc");
        // 3 payload bytes padded to one block, plus header and terminator.
        assert_eq!(archive.len(), 4 * BLOCK_SIZE);
    }

    #[test]
    fn test_empty_archive_is_two_zero_blocks() {
        let mut stream = TarStream::new();
        stream.close().unwrap();
        let archive = stream.into_bytes().unwrap();
        assert_eq!(archive.len(), 2 * BLOCK_SIZE);
        assert!(archive.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut stream = TarStream::new();
        stream.close().unwrap();
        assert!(matches!(
            stream.begin_file("late.txt", 1),
            Err(SwarmstoreError::ArchiveFinalized)
        ));
        assert!(matches!(stream.close(), Err(SwarmstoreError::ArchiveFinalized)));
    }

    #[tokio::test]
    async fn test_item_without_stream_is_rejected() {
        let mut stream = TarStream::new();
        let item = CollectionItem {
            path: "missing.bin".to_string(),
            size: 10,
            data: None,
        };
        assert!(matches!(
            stream.write_item(item).await,
            Err(SwarmstoreError::InvalidCollectionItem)
        ));
        // Nothing was framed; the archive still closes empty.
        stream.close().unwrap();
        assert_eq!(stream.into_bytes().unwrap().len(), 2 * BLOCK_SIZE);
    }

    #[tokio::test]
    async fn test_declared_size_is_enforced() {
        let mut stream = TarStream::new();
        let short = stream
            .write_item(CollectionItem::new("short.bin", 8, &b"abc"[..]))
            .await;
        assert!(matches!(
            short,
            Err(SwarmstoreError::ArchiveEntrySize {
                declared: 8,
                written: 3
            })
        ));

        let mut stream = TarStream::new();
        let long = stream
            .write_item(CollectionItem::new("long.bin", 2, &b"abc"[..]))
            .await;
        assert!(matches!(long, Err(SwarmstoreError::ArchiveEntrySize { .. })));
    }

    #[test]
    fn test_unfinalized_stream_is_not_a_body() {
        let stream = TarStream::new();
        assert!(matches!(
            stream.into_bytes(),
            Err(SwarmstoreError::ArchiveNotFinalized)
        ));
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let mut stream = TarStream::new();
        // Past the slice capacity of the size field.
        assert!(matches!(
            stream.begin_file("huge.bin", 1u64 << 40),
            Err(SwarmstoreError::ArchiveEntryTooLarge { .. })
        ));
        // Fits in 12 digits but loses the NUL terminator.
        assert!(matches!(
            stream.begin_file("big.bin", 1u64 << 33),
            Err(SwarmstoreError::ArchiveEntryTooLarge { .. })
        ));
        // The largest frameable size still produces a header.
        stream.begin_file("max.bin", MAX_ENTRY_SIZE).unwrap();
    }

    #[test]
    fn test_long_path_rejected() {
        let mut stream = TarStream::new();
        let path = "d/".repeat(60);
        assert!(matches!(
            stream.begin_file(&path, 0),
            Err(SwarmstoreError::ArchivePathTooLong(_))
        ));
    }
}
