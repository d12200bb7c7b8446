//! Tests for transparent input/output compression.

use rowpipe::io::compression::{
    CompressionCodec, builtin_codecs, create_output, create_output_with, open_input,
    open_input_with,
};
use rowpipe::testing::TempDirPath;
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

fn write_lines(path: &std::path::Path, lines: &[&str]) -> anyhow::Result<()> {
    let mut out = create_output(path)?;
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

fn read_lines(path: &std::path::Path) -> anyhow::Result<Vec<String>> {
    Ok(open_input(path)?.lines().collect::<io::Result<_>>()?)
}

#[test]
fn test_plain_round_trip_creates_parent_dirs() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.path().join("nested/deeper/rows.csv");
    write_lines(&path, &["a;b", "c;d"])?;
    assert_eq!(std::fs::read_to_string(&path)?, "a;b\nc;d\n");
    assert_eq!(read_lines(&path)?, vec!["a;b", "c;d"]);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn test_gzip_by_extension_and_magic() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("rows.csv.gz");
    write_lines(&path, &["x;1", "y;2"])?;

    let raw = std::fs::read(&path)?;
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    assert_eq!(read_lines(&path)?, vec!["x;1", "y;2"]);

    let renamed = dir.file_path("rows.dat");
    std::fs::rename(&path, &renamed)?;
    assert_eq!(read_lines(&renamed)?, vec!["x;1", "y;2"]);
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn test_zstd_by_extension_and_magic() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("rows.csv.zst");
    write_lines(&path, &["z;3"])?;
    assert_eq!(read_lines(&path)?, vec!["z;3"]);

    let renamed = dir.file_path("rows.bin");
    std::fs::rename(&path, &renamed)?;
    assert_eq!(read_lines(&renamed)?, vec!["z;3"]);
    Ok(())
}

#[test]
fn test_builtin_codecs_follow_features() {
    let names: Vec<String> = builtin_codecs().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(names.contains(&"gzip".to_string()), cfg!(feature = "compression-gzip"));
    assert_eq!(names.contains(&"zstd".to_string()), cfg!(feature = "compression-zstd"));
}

struct UpperCodec;

struct UpperWriter(Box<dyn Write + Send>);

impl Write for UpperWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_all(&buf.to_ascii_uppercase())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl CompressionCodec for UpperCodec {
    fn name(&self) -> &str {
        "upper"
    }

    fn extensions(&self) -> &[&str] {
        &[".up"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        Ok(reader)
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(UpperWriter(writer)))
    }
}

#[test]
fn test_custom_codec_passed_explicitly() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("shout.up");
    let codecs: Vec<Arc<dyn CompressionCodec>> = vec![Arc::new(UpperCodec)];

    let mut out = create_output_with(&path, &codecs)?;
    out.write_all(b"quiet words")?;
    out.flush()?;
    drop(out);

    let mut text = String::new();
    open_input_with(&path, &codecs)?.read_to_string(&mut text)?;
    assert_eq!(text, "QUIET WORDS");

    // Built-in detection knows nothing about `.up`.
    assert_eq!(read_lines(&path)?, vec!["QUIET WORDS"]);
    Ok(())
}

#[test]
fn test_open_missing_file() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let err = match open_input(dir.file_path("absent.csv")) {
        Ok(_) => anyhow::bail!("opening a missing file must fail"),
        Err(e) => e,
    };
    assert!(err.to_string().starts_with("open "));
    Ok(())
}
