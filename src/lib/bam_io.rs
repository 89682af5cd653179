//! BAM file I/O helpers.
//!
//! Thin constructors pairing BAM readers with their headers and writers with
//! the header already written, so command code cannot forget either half.

use anyhow::{Context, Result};
use noodles::bam;
use noodles::bgzf;
use noodles::sam::Header;
use std::fs::File;
use std::path::Path;

/// A BAM reader over a BGZF-compressed file.
pub type BamReader = bam::io::Reader<bgzf::Reader<File>>;

/// A BAM writer over a BGZF-compressed file.
pub type BamWriter = bam::io::Writer<bgzf::Writer<File>>;

/// Opens a BAM file for reading and reads its header.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its header is invalid.
pub fn create_bam_reader<P: AsRef<Path>>(path: P) -> Result<(BamReader, Header)> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open BAM: {}", path.display()))?;
    let mut reader = bam::io::Reader::new(file);
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read BAM header: {}", path.display()))?;
    Ok((reader, header))
}

/// Creates a BAM file for writing and writes the header.
///
/// # Errors
///
/// Returns an error if the file cannot be created or the header cannot be
/// written.
pub fn create_bam_writer<P: AsRef<Path>>(path: P, header: &Header) -> Result<BamWriter> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create BAM: {}", path.display()))?;
    let mut writer = bam::io::Writer::new(file);
    writer
        .write_header(header)
        .with_context(|| format!("Failed to write BAM header: {}", path.display()))?;
    Ok(writer)
}
