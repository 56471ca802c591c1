//! Forward-only ZIP writer over an async stream.
//!
//! Entries are written one at a time. A streaming entry's size and checksum
//! are unknown when its local header goes out, so it is written with a
//! trailing data descriptor (general purpose flag bit 3); whole entries whose
//! bytes are already in memory get a complete local header instead.
//!
//! ZIP64 is not supported: an entry or archive offset past 4 GiB fails with
//! [`Error::Zip`].

use crate::common::error::{Error, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

const LOCAL_FILE_HEADER_SIG: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const CENTRAL_DIRECTORY_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIG: u32 = 0x0605_4b50;

const VERSION_NEEDED: u16 = 20;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_UTF8_NAME: u16 = 1 << 11;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

const MAX_ENTRIES: usize = u16::MAX as usize;

/// Compression method for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMethod {
    Stored,
    Deflated,
}

impl EntryMethod {
    fn code(self) -> u16 {
        match self {
            Self::Stored => METHOD_STORED,
            Self::Deflated => METHOD_DEFLATED,
        }
    }
}

/// Central directory record kept for every finished entry.
#[derive(Debug)]
struct CentralEntry {
    name: String,
    flags: u16,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    offset: u32,
}

/// The entry currently receiving streamed data.
struct OpenEntry {
    name: String,
    offset: u32,
    encoder: DeflateEncoder<Vec<u8>>,
    hasher: crc32fast::Hasher,
    uncompressed: u64,
    compressed: u64,
}

/// Sizes reported when an entry is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySummary {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

/// Streaming ZIP archive writer.
pub struct ArchiveWriter<W> {
    sink: W,
    offset: u64,
    entries: Vec<CentralEntry>,
    current: Option<OpenEntry>,
    compression: Compression,
    dos_time: u16,
    dos_date: u16,
}

impl<W: AsyncWrite + Unpin> ArchiveWriter<W> {
    /// Create a writer; every entry is stamped with `modified`.
    pub fn new(sink: W, compression: Compression, modified: NaiveDateTime) -> Self {
        let (dos_time, dos_date) = to_dos_datetime(modified);
        Self {
            sink,
            offset: 0,
            entries: Vec::new(),
            current: None,
            compression,
            dos_time,
            dos_date,
        }
    }

    /// Number of finished entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Open a deflated entry whose content arrives through
    /// [`write_entry_data`](Self::write_entry_data).
    pub async fn start_entry(&mut self, name: &str) -> Result<()> {
        self.check_can_start(name)?;

        let offset = self.checked_offset()?;
        let flags = FLAG_DATA_DESCRIPTOR | FLAG_UTF8_NAME;
        let header = self.local_header(name, flags, METHOD_DEFLATED, 0, 0, 0);
        write_counted(&mut self.sink, &mut self.offset, &header).await?;

        debug!(entry = name, offset, "zip entry started");
        self.current = Some(OpenEntry {
            name: name.to_string(),
            offset,
            encoder: DeflateEncoder::new(Vec::new(), self.compression),
            hasher: crc32fast::Hasher::new(),
            uncompressed: 0,
            compressed: 0,
        });
        Ok(())
    }

    /// Compress `data` into the open entry and forward whatever the encoder
    /// has produced to the sink.
    pub async fn write_entry_data(&mut self, data: &[u8]) -> Result<()> {
        let entry = self
            .current
            .as_mut()
            .ok_or_else(|| Error::invalid_operation("No zip entry is open"))?;

        entry.encoder.write_all(data)?;
        entry.hasher.update(data);
        entry.uncompressed += data.len() as u64;

        let chunk = std::mem::take(entry.encoder.get_mut());
        if !chunk.is_empty() {
            entry.compressed += chunk.len() as u64;
            write_counted(&mut self.sink, &mut self.offset, &chunk).await?;
        }
        Ok(())
    }

    /// Close the open entry, writing the remaining compressed bytes and the
    /// data descriptor.
    pub async fn finish_entry(&mut self) -> Result<EntrySummary> {
        let mut entry = self
            .current
            .take()
            .ok_or_else(|| Error::invalid_operation("No zip entry is open"))?;

        let tail = entry.encoder.finish()?;
        entry.compressed += tail.len() as u64;
        write_counted(&mut self.sink, &mut self.offset, &tail).await?;

        let summary = EntrySummary {
            crc32: entry.hasher.finalize(),
            compressed_size: checked_size(entry.compressed, &entry.name)?,
            uncompressed_size: checked_size(entry.uncompressed, &entry.name)?,
        };

        let mut descriptor = Vec::with_capacity(16);
        put_u32(&mut descriptor, DATA_DESCRIPTOR_SIG);
        put_u32(&mut descriptor, summary.crc32);
        put_u32(&mut descriptor, summary.compressed_size);
        put_u32(&mut descriptor, summary.uncompressed_size);
        write_counted(&mut self.sink, &mut self.offset, &descriptor).await?;

        debug!(
            entry = entry.name.as_str(),
            compressed = summary.compressed_size,
            uncompressed = summary.uncompressed_size,
            "zip entry finished"
        );

        self.entries.push(CentralEntry {
            name: entry.name,
            flags: FLAG_DATA_DESCRIPTOR | FLAG_UTF8_NAME,
            method: METHOD_DEFLATED,
            crc32: summary.crc32,
            compressed_size: summary.compressed_size,
            uncompressed_size: summary.uncompressed_size,
            offset: entry.offset,
        });
        Ok(summary)
    }

    /// Write a complete entry whose content is already in memory.
    pub async fn write_entry(
        &mut self,
        name: &str,
        data: &[u8],
        method: EntryMethod,
    ) -> Result<EntrySummary> {
        self.check_can_start(name)?;

        let crc32 = crc32fast::hash(data);
        let uncompressed_size = checked_size(data.len() as u64, name)?;
        let compressed = match method {
            EntryMethod::Stored => None,
            EntryMethod::Deflated => {
                let mut encoder = DeflateEncoder::new(
                    Vec::with_capacity(data.len() / 2),
                    self.compression,
                );
                encoder.write_all(data)?;
                Some(encoder.finish()?)
            },
        };
        let body = compressed.as_deref().unwrap_or(data);
        let compressed_size = checked_size(body.len() as u64, name)?;

        let offset = self.checked_offset()?;
        let header = self.local_header(
            name,
            FLAG_UTF8_NAME,
            method.code(),
            crc32,
            compressed_size,
            uncompressed_size,
        );
        write_counted(&mut self.sink, &mut self.offset, &header).await?;
        write_counted(&mut self.sink, &mut self.offset, body).await?;

        self.entries.push(CentralEntry {
            name: name.to_string(),
            flags: FLAG_UTF8_NAME,
            method: method.code(),
            crc32,
            compressed_size,
            uncompressed_size,
            offset,
        });

        debug!(entry = name, size = uncompressed_size, "zip entry written");
        Ok(EntrySummary {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }

    /// Write the central directory and return the sink.
    pub async fn finish(mut self) -> Result<W> {
        if self.current.is_some() {
            return Err(Error::invalid_operation(
                "Cannot finish an archive while an entry is open",
            ));
        }

        let cd_offset = self.checked_offset()?;
        let mut directory = Vec::with_capacity(self.entries.len() * 96 + 22);
        for entry in &self.entries {
            put_u32(&mut directory, CENTRAL_DIRECTORY_SIG);
            put_u16(&mut directory, VERSION_NEEDED); // version made by (MS-DOS)
            put_u16(&mut directory, VERSION_NEEDED);
            put_u16(&mut directory, entry.flags);
            put_u16(&mut directory, entry.method);
            put_u16(&mut directory, self.dos_time);
            put_u16(&mut directory, self.dos_date);
            put_u32(&mut directory, entry.crc32);
            put_u32(&mut directory, entry.compressed_size);
            put_u32(&mut directory, entry.uncompressed_size);
            put_u16(&mut directory, entry.name.len() as u16);
            put_u16(&mut directory, 0); // extra field length
            put_u16(&mut directory, 0); // comment length
            put_u16(&mut directory, 0); // disk number start
            put_u16(&mut directory, 0); // internal attributes
            put_u32(&mut directory, 0); // external attributes
            put_u32(&mut directory, entry.offset);
            directory.extend_from_slice(entry.name.as_bytes());
        }

        let cd_size = checked_size(directory.len() as u64, "central directory")?;
        let count = self.entries.len() as u16;
        put_u32(&mut directory, END_OF_CENTRAL_DIRECTORY_SIG);
        put_u16(&mut directory, 0); // this disk
        put_u16(&mut directory, 0); // disk with central directory
        put_u16(&mut directory, count);
        put_u16(&mut directory, count);
        put_u32(&mut directory, cd_size);
        put_u32(&mut directory, cd_offset);
        put_u16(&mut directory, 0); // comment length

        write_counted(&mut self.sink, &mut self.offset, &directory).await?;
        self.sink.flush().await?;

        debug!(
            entries = self.entries.len(),
            bytes = self.offset,
            "zip archive finished"
        );
        Ok(self.sink)
    }

    fn check_can_start(&self, name: &str) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::invalid_operation(format!(
                "Cannot start entry '{}' while another entry is open",
                name
            )));
        }
        if self.entries.len() >= MAX_ENTRIES {
            return Err(Error::Zip(format!(
                "Archive cannot hold more than {} entries",
                MAX_ENTRIES
            )));
        }
        if name.len() > u16::MAX as usize {
            return Err(Error::Zip(format!("Entry name too long: {}", name.len())));
        }
        Ok(())
    }

    fn checked_offset(&self) -> Result<u32> {
        u32::try_from(self.offset)
            .map_err(|_| Error::Zip("Archive exceeds 4 GiB; ZIP64 is not supported".to_string()))
    }

    fn local_header(
        &self,
        name: &str,
        flags: u16,
        method: u16,
        crc32: u32,
        compressed_size: u32,
        uncompressed_size: u32,
    ) -> Vec<u8> {
        let mut header = Vec::with_capacity(30 + name.len());
        put_u32(&mut header, LOCAL_FILE_HEADER_SIG);
        put_u16(&mut header, VERSION_NEEDED);
        put_u16(&mut header, flags);
        put_u16(&mut header, method);
        put_u16(&mut header, self.dos_time);
        put_u16(&mut header, self.dos_date);
        put_u32(&mut header, crc32);
        put_u32(&mut header, compressed_size);
        put_u32(&mut header, uncompressed_size);
        put_u16(&mut header, name.len() as u16);
        put_u16(&mut header, 0); // extra field length
        header.extend_from_slice(name.as_bytes());
        header
    }
}

async fn write_counted<W: AsyncWrite + Unpin>(
    sink: &mut W,
    offset: &mut u64,
    bytes: &[u8],
) -> Result<()> {
    sink.write_all(bytes).await?;
    *offset += bytes.len() as u64;
    Ok(())
}

fn checked_size(size: u64, name: &str) -> Result<u32> {
    u32::try_from(size).map_err(|_| {
        Error::Zip(format!(
            "'{}' exceeds 4 GiB; ZIP64 is not supported",
            name
        ))
    })
}

#[inline]
fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// MS-DOS time and date words. Years before 1980 clamp to 1980-01-01.
fn to_dos_datetime(dt: NaiveDateTime) -> (u16, u16) {
    if dt.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
    let year = (dt.year() - 1980).min(127) as u16;
    let date = (year << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
    (time, date)
}
