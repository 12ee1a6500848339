//! Cache file compression.
//!
//! A compressed cache file keeps its 0x800 byte header uncompressed, always
//! in the standard layout, and stores the rest as a zstd stream. The header
//! carries the compressed dialect value and the total uncompressed length.
#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tag_format::cache_header::HEADER_SIZE;
use tag_format::{CacheHeader, Dialect, HeaderLayout};
use thiserror::Error;
use zstd::stream::raw::{Decoder, InBuffer, Operation, OutBuffer};
use zstd::zstd_safe::DCtx;

pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 19;
pub const DEFAULT_LEVEL: i32 = 19;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("invalid cache file header")]
    InvalidHeader,
    #[error("map is already compressed")]
    MapNeedsDecompressed,
    #[error("map is already decompressed")]
    MapNeedsCompressed,
    #[error("unsupported dialect 0x{0:X}")]
    UnsupportedDialect(u32),
    #[error("compression level {0} is outside {MIN_LEVEL}..={MAX_LEVEL}")]
    InvalidLevel(i32),
    #[error("map is too large to record its size ({0} bytes)")]
    FileTooLarge(u64),
    #[error("decompressed {actual} bytes but the header records {expected}")]
    DecompressionSizeMismatch { expected: u64, actual: u64 },
    #[error("compression failed: {0}")]
    Encoder(#[source] io::Error),
    #[error("decompression failed: {0}")]
    Decoder(#[source] io::Error),
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CompressionError + '_ {
    move |source| CompressionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn check_level(level: i32) -> Result<(), CompressionError> {
    if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        Ok(())
    } else {
        Err(CompressionError::InvalidLevel(level))
    }
}

/// Header of the compressed file for an uncompressed header and the total
/// uncompressed file length.
pub fn compressed_header(header: &[u8], total_len: u64) -> Result<Vec<u8>, CompressionError> {
    let (mut parsed, layout) =
        CacheHeader::detect(header).map_err(|_| CompressionError::InvalidHeader)?;
    let dialect = match parsed.dialect() {
        Some(dialect)
            if dialect.is_compressed_variant() || parsed.decompressed_file_size != 0 =>
        {
            return Err(CompressionError::MapNeedsDecompressed)
        }
        Some(Dialect::DarkCirclet) => Dialect::DarkCirclet,
        Some(dialect) => dialect
            .compressed()
            .ok_or(CompressionError::UnsupportedDialect(parsed.engine))?,
        None => return Err(CompressionError::UnsupportedDialect(parsed.engine)),
    };
    let size = u32::try_from(total_len).map_err(|_| CompressionError::FileTooLarge(total_len))?;

    parsed.engine = dialect.to_u32();
    parsed.decompressed_file_size = size;
    parsed.set_literals(HeaderLayout::Standard);
    let mut out = match layout {
        HeaderLayout::Standard => header[..HEADER_SIZE].to_vec(),
        HeaderLayout::Demo => vec![0u8; HEADER_SIZE],
    };
    parsed.write_into(&mut out, HeaderLayout::Standard);
    Ok(out)
}

/// Header of the decompressed file and the total length it must reach.
pub fn decompressed_header(header: &[u8]) -> Result<(Vec<u8>, u64), CompressionError> {
    let mut parsed = CacheHeader::read(header, HeaderLayout::Standard)
        .map_err(|_| CompressionError::InvalidHeader)?;
    if !parsed.has_literals(HeaderLayout::Standard) {
        return Err(match CacheHeader::detect(header) {
            Ok((demo, HeaderLayout::Demo)) if demo.dialect() == Some(Dialect::Demo) => {
                CompressionError::MapNeedsCompressed
            }
            _ => CompressionError::InvalidHeader,
        });
    }
    let dialect = match parsed.dialect() {
        Some(Dialect::DarkCirclet) if parsed.decompressed_file_size == 0 => {
            return Err(CompressionError::MapNeedsCompressed)
        }
        Some(Dialect::DarkCirclet) => Dialect::DarkCirclet,
        Some(dialect) if !dialect.is_compressed_variant() => {
            return Err(CompressionError::MapNeedsCompressed)
        }
        Some(dialect) => dialect
            .decompressed()
            .ok_or(CompressionError::UnsupportedDialect(parsed.engine))?,
        None => return Err(CompressionError::UnsupportedDialect(parsed.engine)),
    };
    let total = u64::from(parsed.decompressed_file_size);
    if total < HEADER_SIZE as u64 {
        return Err(CompressionError::InvalidHeader);
    }

    parsed.engine = dialect.to_u32();
    parsed.decompressed_file_size = 0;
    let out = if dialect == Dialect::Demo {
        parsed.set_literals(HeaderLayout::Demo);
        parsed.to_bytes(HeaderLayout::Demo)
    } else {
        let mut out = header[..HEADER_SIZE].to_vec();
        parsed.write_into(&mut out, HeaderLayout::Standard);
        out
    };
    Ok((out, total))
}

pub fn compress_map(data: &[u8], level: i32) -> Result<Vec<u8>, CompressionError> {
    check_level(level)?;
    let mut out = compressed_header(data, data.len() as u64)?;
    let body = zstd::stream::encode_all(&data[HEADER_SIZE..], level)
        .map_err(CompressionError::Encoder)?;
    out.extend_from_slice(&body);
    tracing::debug!(from = data.len(), to = out.len(), level, "compressed map");
    Ok(out)
}

pub fn decompress_map(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let (mut out, total) = decompressed_header(data)?;
    let body = &data[HEADER_SIZE..];
    let mut reader = Cursor::new(body);
    let written = stream_decompress(&mut reader, body.len() as u64, &mut out)?;
    check_size(total, HEADER_SIZE as u64 + written)?;
    tracing::debug!(from = data.len(), to = out.len(), "decompressed map");
    Ok(out)
}

fn check_size(expected: u64, actual: u64) -> Result<(), CompressionError> {
    if expected == actual {
        Ok(())
    } else {
        Err(CompressionError::DecompressionSizeMismatch { expected, actual })
    }
}

/// Decodes `len` bytes of zstd stream from `input` into `output`, feeding
/// the decoder chunks of the size it asks for. Returns the decoded length.
pub fn stream_decompress<R: Read, W: Write>(
    input: &mut R,
    len: u64,
    output: &mut W,
) -> Result<u64, CompressionError> {
    let mut decoder = Decoder::new().map_err(CompressionError::Decoder)?;
    let mut out = vec![0u8; DCtx::out_size()];
    let mut chunk = Vec::new();
    let mut remaining = len;
    let mut hint = DCtx::in_size();
    let mut written = 0u64;

    while remaining > 0 {
        let take = (hint as u64).min(remaining) as usize;
        chunk.resize(take, 0);
        input
            .read_exact(&mut chunk)
            .map_err(CompressionError::Decoder)?;
        remaining -= take as u64;

        let mut source = InBuffer::around(&chunk);
        loop {
            let produced = {
                let mut sink = OutBuffer::around(&mut out[..]);
                hint = decoder
                    .run(&mut source, &mut sink)
                    .map_err(CompressionError::Decoder)?;
                sink.pos()
            };
            output
                .write_all(&out[..produced])
                .map_err(CompressionError::Decoder)?;
            written += produced as u64;
            if source.pos() == chunk.len() && produced < out.len() {
                break;
            }
        }
        if hint == 0 {
            hint = DCtx::in_size();
        } else if remaining == 0 {
            return Err(CompressionError::Decoder(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "zstd stream ends mid-frame",
            )));
        }
    }
    Ok(written)
}

/// Compresses `input` into `output`, or over `input` when no output is
/// given.
pub fn compress_map_file(
    input: &Path,
    output: Option<&Path>,
    level: i32,
) -> Result<u64, CompressionError> {
    check_level(level)?;
    let output = output.unwrap_or(input);
    let total = fs::metadata(input).map_err(io_error(input))?.len();
    let mut reader = BufReader::new(File::open(input).map_err(io_error(input))?);
    let header = read_header(&mut reader, input)?;
    let header = compressed_header(&header, total)?;

    let mut staged = stage(output)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        writer.write_all(&header).map_err(io_error(output))?;
        zstd::stream::copy_encode(&mut reader, &mut writer, level)
            .map_err(CompressionError::Encoder)?;
        writer.flush().map_err(io_error(output))?;
    }
    let size = finish(staged, output)?;
    tracing::info!(input = %input.display(), output = %output.display(), from = total, to = size, "compressed");
    Ok(size)
}

/// Decompresses `input` into `output`, or over `input` when no output is
/// given.
pub fn decompress_map_file(input: &Path, output: Option<&Path>) -> Result<u64, CompressionError> {
    let output = output.unwrap_or(input);
    let total_in = fs::metadata(input).map_err(io_error(input))?.len();
    let mut reader = BufReader::new(File::open(input).map_err(io_error(input))?);
    let header = read_header(&mut reader, input)?;
    let (header, expected) = decompressed_header(&header)?;

    let mut staged = stage(output)?;
    let written = {
        let mut writer = BufWriter::new(staged.as_file_mut());
        writer.write_all(&header).map_err(io_error(output))?;
        let body = total_in - HEADER_SIZE as u64;
        let written = stream_decompress(&mut reader, body, &mut writer)?;
        writer.flush().map_err(io_error(output))?;
        written
    };
    check_size(expected, HEADER_SIZE as u64 + written)?;
    let size = finish(staged, output)?;
    tracing::info!(input = %input.display(), output = %output.display(), from = total_in, to = size, "decompressed");
    Ok(size)
}

fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<Vec<u8>, CompressionError> {
    let mut header = vec![0u8; HEADER_SIZE];
    match reader.read_exact(&mut header) {
        Ok(()) => Ok(header),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            Err(CompressionError::InvalidHeader)
        }
        Err(err) => Err(io_error(path)(err)),
    }
}

/// Temporary file next to `output`, so the final rename stays on one
/// filesystem and a failed run leaves the target untouched.
fn stage(output: &Path) -> Result<tempfile::NamedTempFile, CompressionError> {
    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tempfile::NamedTempFile::new_in(&dir).map_err(io_error(&dir))
}

fn finish(staged: tempfile::NamedTempFile, output: &Path) -> Result<u64, CompressionError> {
    let file = staged
        .persist(output)
        .map_err(|err| io_error(output)(err.error))?;
    Ok(file.metadata().map_err(io_error(output))?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tag_format::cache_header::{DEMO_HEAD_LITERAL, FOOT_LITERAL, HEAD_LITERAL};
    use tag_format::MapType;

    fn map(dialect: Dialect, body_len: usize) -> Vec<u8> {
        let layout = if dialect.uses_demo_layout() {
            HeaderLayout::Demo
        } else {
            HeaderLayout::Standard
        };
        let mut header = CacheHeader::new(dialect, layout);
        header.tag_data_offset = HEADER_SIZE as u32;
        header.tag_data_size = body_len as u32;
        header.map_type = MapType::Multiplayer.to_u16();
        header.crc32 = 0x1234_5678;
        header.set_name("bloodgulch");
        header.set_build("01.00.00.0609");
        let mut file = header.to_bytes(layout);
        file.extend((0..body_len).map(|i| (i % 251) as u8 ^ (i / 4096) as u8));
        file
    }

    fn engine(data: &[u8]) -> u32 {
        CacheHeader::read(data, HeaderLayout::Standard)
            .expect("header")
            .engine
    }

    #[test]
    fn compression_round_trips() {
        for dialect in [Dialect::Retail, Dialect::CustomEdition, Dialect::Demo] {
            let original = map(dialect, 100_000);
            let compressed = compress_map(&original, 3).expect("compress");
            assert!(compressed.len() < original.len());
            assert_eq!(
                engine(&compressed),
                dialect.compressed().expect("compressible").to_u32()
            );
            let restored = decompress_map(&compressed).expect("decompress");
            assert_eq!(restored, original, "{}", dialect);
        }
    }

    #[test]
    fn compressed_header_records_the_total_length() {
        let original = map(Dialect::CustomEdition, 5000);
        let compressed = compress_map(&original, 1).expect("compress");
        let header = CacheHeader::read(&compressed, HeaderLayout::Standard).expect("header");
        assert_eq!(header.decompressed_file_size as usize, original.len());
        assert_eq!((header.head_literal, header.foot_literal), (HEAD_LITERAL, FOOT_LITERAL));
        assert_eq!(header.name_str(), "bloodgulch");
    }

    #[test]
    fn demo_maps_compress_into_the_standard_layout() {
        let original = map(Dialect::Demo, 2048);
        let compressed = compress_map(&original, 1).expect("compress");
        assert_eq!(engine(&compressed), Dialect::DemoCompressed.to_u32());
        let restored = decompress_map(&compressed).expect("decompress");
        let (header, layout) = CacheHeader::detect(&restored).expect("detect");
        assert_eq!(layout, HeaderLayout::Demo);
        assert_eq!(header.head_literal, DEMO_HEAD_LITERAL);
    }

    #[test]
    fn dark_circlet_keeps_its_dialect() {
        let original = map(Dialect::DarkCirclet, 4096);
        let compressed = compress_map(&original, 1).expect("compress");
        assert_eq!(engine(&compressed), Dialect::DarkCirclet.to_u32());
        assert!(matches!(
            compress_map(&compressed, 1),
            Err(CompressionError::MapNeedsDecompressed)
        ));
        assert_eq!(decompress_map(&compressed).expect("decompress"), original);
        assert!(matches!(
            decompress_map(&original),
            Err(CompressionError::MapNeedsCompressed)
        ));
    }

    #[test]
    fn already_compressed_maps_are_refused() {
        let compressed = compress_map(&map(Dialect::Retail, 1024), 1).expect("compress");
        assert!(matches!(
            compress_map(&compressed, 1),
            Err(CompressionError::MapNeedsDecompressed)
        ));
    }

    #[test]
    fn recorded_sizes_mark_a_map_as_compressed() {
        for dialect in [Dialect::Retail, Dialect::CustomEdition, Dialect::Demo] {
            let mut data = map(dialect, 1024);
            let (mut header, layout) = CacheHeader::detect(&data).expect("detect");
            header.decompressed_file_size = 4096;
            header.write_into(&mut data, layout);
            assert!(
                matches!(
                    compress_map(&data, 1),
                    Err(CompressionError::MapNeedsDecompressed)
                ),
                "{}",
                dialect
            );
        }
    }

    #[test]
    fn uncompressed_maps_cannot_be_decompressed() {
        assert!(matches!(
            decompress_map(&map(Dialect::Retail, 1024)),
            Err(CompressionError::MapNeedsCompressed)
        ));
        assert!(matches!(
            decompress_map(&map(Dialect::Demo, 1024)),
            Err(CompressionError::MapNeedsCompressed)
        ));
    }

    #[test]
    fn bad_headers_are_rejected() {
        let mut unknown = map(Dialect::Retail, 1024);
        unknown[4..8].copy_from_slice(&42u32.to_le_bytes());
        assert!(matches!(
            compress_map(&unknown, 1),
            Err(CompressionError::UnsupportedDialect(42))
        ));
        assert!(matches!(
            decompress_map(&unknown),
            Err(CompressionError::UnsupportedDialect(42))
        ));

        let mut garbage = map(Dialect::Retail, 1024);
        garbage[0..4].copy_from_slice(b"nope");
        assert!(matches!(
            compress_map(&garbage, 1),
            Err(CompressionError::InvalidHeader)
        ));
        assert!(matches!(
            decompress_map(&garbage[..100]),
            Err(CompressionError::InvalidHeader)
        ));
    }

    #[test]
    fn size_mismatch_is_detected() {
        let mut compressed = compress_map(&map(Dialect::Retail, 4096), 1).expect("compress");
        let recorded = u32::from_le_bytes(compressed[8..12].try_into().expect("size"));
        compressed[8..12].copy_from_slice(&(recorded + 1).to_le_bytes());
        assert!(matches!(
            decompress_map(&compressed),
            Err(CompressionError::DecompressionSizeMismatch { expected, actual })
                if expected == u64::from(recorded) + 1 && actual == u64::from(recorded)
        ));
    }

    #[test]
    fn truncated_streams_fail() {
        let compressed = compress_map(&map(Dialect::Retail, 50_000), 1).expect("compress");
        let cut = &compressed[..compressed.len() - 8];
        assert!(matches!(
            decompress_map(cut),
            Err(CompressionError::Decoder(_))
        ));
    }

    #[test]
    fn levels_are_bounded() {
        let original = map(Dialect::Retail, 512);
        assert!(matches!(
            compress_map(&original, 0),
            Err(CompressionError::InvalidLevel(0))
        ));
        assert!(matches!(
            compress_map(&original, 20),
            Err(CompressionError::InvalidLevel(20))
        ));
    }

    #[test]
    fn file_variants_round_trip_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.map");
        let original = map(Dialect::CustomEdition, 70_000);
        fs::write(&path, &original).expect("write");

        let compressed_size = compress_map_file(&path, None, 3).expect("compress");
        let on_disk = fs::read(&path).expect("read");
        assert_eq!(on_disk.len() as u64, compressed_size);
        assert_eq!(engine(&on_disk), Dialect::CustomEditionCompressed.to_u32());
        assert_eq!(decompress_map(&on_disk).expect("decompress"), original);

        let out = dir.path().join("out.map");
        let size = decompress_map_file(&path, Some(&out)).expect("decompress");
        assert_eq!(size, original.len() as u64);
        assert_eq!(fs::read(&out).expect("read"), original);
    }

    #[test]
    fn failed_file_runs_leave_the_target_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plain.map");
        let original = map(Dialect::Retail, 1024);
        fs::write(&path, &original).expect("write");
        assert!(matches!(
            decompress_map_file(&path, None),
            Err(CompressionError::MapNeedsCompressed)
        ));
        assert_eq!(fs::read(&path).expect("read"), original);
    }
}
