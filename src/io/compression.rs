//! Transparent compression for file inputs and outputs.
//!
//! Files are matched to a [`CompressionCodec`] by extension first and, for
//! inputs, by magic bytes when the extension says nothing. Built-in codecs are
//! enabled by feature flags:
//!
//! - **Gzip** (`.gz`, `.gzip`) via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`, `.zstd`) via `zstd` (feature: `compression-zstd`)
//!
//! Extra codecs are passed explicitly to [`open_input_with`] /
//! [`create_output_with`]; there is no global registry.
//!
//! ```no_run
//! use rowpipe::io::compression::{create_output, open_input};
//! use std::io::{BufRead, Write};
//! # fn main() -> anyhow::Result<()> {
//! let mut out = create_output("rows.csv.gz")?;
//! writeln!(out, "a;b")?;
//! drop(out);
//!
//! let input = open_input("rows.csv.gz")?;
//! assert_eq!(input.lines().count(), 1);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Boxed, thread-movable buffered input.
pub type InputStream = Box<dyn BufRead + Send>;

/// Boxed, thread-movable output.
pub type OutputStream = Box<dyn Write + Send>;

/// A compression format that can wrap readers and writers.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip").
    fn name(&self) -> &str;

    /// Lowercase file extensions including the leading dot.
    fn extensions(&self) -> &[&str];

    /// Signature at the start of a compressed stream, if the format has one.
    fn magic_bytes(&self) -> Option<&[u8]>;

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>>;

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn Write + Send>>;
}

/// Codecs compiled into this build.
#[must_use]
pub fn builtin_codecs() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
    ]
}

fn by_extension(codecs: &[Arc<dyn CompressionCodec>], path: &Path) -> Option<Arc<dyn CompressionCodec>> {
    let name = path.to_string_lossy().to_lowercase();
    codecs
        .iter()
        .find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
        .cloned()
}

fn by_magic<R: BufRead>(
    codecs: &[Arc<dyn CompressionCodec>],
    reader: &mut R,
) -> io::Result<Option<Arc<dyn CompressionCodec>>> {
    let head = reader.fill_buf()?;
    Ok(codecs
        .iter()
        .find(|c| c.magic_bytes().is_some_and(|m| head.starts_with(m)))
        .cloned())
}

/// Open `path` for reading, decompressing with a built-in codec if it is
/// compressed.
///
/// # Errors
/// Returns an error if the file cannot be opened or the codec fails to start.
pub fn open_input(path: impl AsRef<Path>) -> Result<InputStream> {
    open_input_with(path, &builtin_codecs())
}

/// Like [`open_input`] but detecting among `codecs` only.
///
/// # Errors
/// Returns an error if the file cannot be opened or the codec fails to start.
pub fn open_input_with(
    path: impl AsRef<Path>,
    codecs: &[Arc<dyn CompressionCodec>],
) -> Result<InputStream> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;

    if let Some(codec) = by_extension(codecs, path) {
        let inner = codec
            .wrap_reader(Box::new(file))
            .with_context(|| format!("wrap {} with {} codec", path.display(), codec.name()))?;
        return Ok(Box::new(BufReader::new(inner)));
    }

    let mut buffered = BufReader::new(file);
    let detected = by_magic(codecs, &mut buffered)
        .with_context(|| format!("read header of {}", path.display()))?;
    match detected {
        Some(codec) => {
            let inner = codec
                .wrap_reader(Box::new(buffered))
                .with_context(|| format!("wrap {} with {} codec", path.display(), codec.name()))?;
            Ok(Box::new(BufReader::new(inner)))
        }
        None => Ok(Box::new(buffered)),
    }
}

/// Create `path` for writing (making parent directories), compressing by
/// extension with a built-in codec.
///
/// # Errors
/// Returns an error if the directories or file cannot be created.
pub fn create_output(path: impl AsRef<Path>) -> Result<OutputStream> {
    create_output_with(path, &builtin_codecs())
}

/// Like [`create_output`] but choosing among `codecs` only.
///
/// # Errors
/// Returns an error if the directories or file cannot be created.
pub fn create_output_with(
    path: impl AsRef<Path>,
    codecs: &[Arc<dyn CompressionCodec>],
) -> Result<OutputStream> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    match by_extension(codecs, path) {
        Some(codec) => codec
            .wrap_writer(Box::new(BufWriter::new(file)))
            .with_context(|| format!("wrap {} with {} codec", path.display(), codec.name())),
        None => Ok(Box::new(BufWriter::new(file))),
    }
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(flate2::write::GzEncoder::new(
            writer,
            flate2::Compression::default(),
        )))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read + Send>)
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn Write + Send>> {
        zstd::stream::write::Encoder::new(writer, 3)
            .map(|e| Box::new(e.auto_finish()) as Box<dyn Write + Send>)
    }
}
