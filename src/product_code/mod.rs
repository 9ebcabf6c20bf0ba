use crate::cue::CueParser;
use crate::iso9660::IsoFilesystem;
use crate::iso9660::image::open_image;
use crate::product_code::error::{ProductCodeError, ProductCodeResult};
use crate::product_code::models::{CodeSource, ExtractedCode, ProductCode};
use crate::product_code::system_cnf::SystemCnf;
use crate::util::fs::{file_stem, has_extension};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, BufReader};

pub mod error;
pub mod models;
pub mod system_cnf;

/// Raw scans give up after this many bytes, discs expose the code early.
pub const SCAN_LIMIT: u64 = 64 * 1024 * 1024;
pub const SCAN_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Longer than any code match, so matches crossing a chunk edge survive.
const SCAN_OVERLAP: usize = 16;

lazy_static! {
    static ref RAW_CODE_RE: regex::bytes::Regex =
        regex::bytes::Regex::new(r"[A-Z]{4}[-_][0-9]{3}\.?[0-9]{2}").unwrap();
    // Lowercase is only trusted for the common S[CL]xx families.
    static ref NAME_CODE_RE: Regex =
        Regex::new(r"(?:(?i:s[cl][a-z]{2})|[A-Z]{4})[-_][0-9]{3}\.?[0-9]{2}").unwrap();
}

/// Reads `SYSTEM.CNF` from the root of a mounted disc.
pub async fn extract_from_filesystem<R>(fs: &mut IsoFilesystem<R>) -> ProductCodeResult<ExtractedCode>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    let entry = fs.resolve(&["SYSTEM.CNF"]).await?;
    let contents = fs.read_file(&entry).await?;
    let cnf = SystemCnf::parse(&String::from_utf8_lossy(&contents))?;
    debug!("SYSTEM.CNF boots {} ({:?})", cnf.boot_path, cnf.platform);

    Ok(ExtractedCode::new(cnf.product_code()?, CodeSource::Filesystem))
}

/// Looks for a code string in the first [`SCAN_LIMIT`] bytes of `reader`.
pub async fn scan_raw<R: AsyncRead + Unpin>(reader: &mut R) -> ProductCodeResult<Option<ProductCode>> {
    let mut chunk = vec![0u8; SCAN_CHUNK_SIZE];
    let mut window = Vec::with_capacity(SCAN_CHUNK_SIZE + SCAN_OVERLAP);
    let mut scanned = 0u64;

    while scanned < SCAN_LIMIT {
        let wanted = (SCAN_LIMIT - scanned).min(SCAN_CHUNK_SIZE as u64) as usize;
        let read = reader.read(&mut chunk[..wanted]).await?;
        if read == 0 {
            break;
        }
        scanned += read as u64;
        window.extend_from_slice(&chunk[..read]);

        for found in RAW_CODE_RE.find_iter(&window) {
            let Ok(text) = std::str::from_utf8(found.as_bytes()) else {
                continue;
            };
            if let Ok(code) = ProductCode::parse(text) {
                debug!("Raw scan matched {text:?} after {scanned} bytes");
                return Ok(Some(code));
            }
        }

        let keep = window.len().min(SCAN_OVERLAP);
        window.drain(..window.len() - keep);
    }

    Ok(None)
}

/// A code already embedded in a file name, such as `Game [SLUS_012.34].bin`.
pub fn find_in_file_name(name: &str) -> Option<ProductCode> {
    locate_in_file_name(name).map(|(_, code)| code)
}

/// Byte range and value of the first code token in `name`.
pub fn locate_in_file_name(name: &str) -> Option<(Range<usize>, ProductCode)> {
    NAME_CODE_RE.find_iter(name).find_map(|found| {
        ProductCode::parse(found.as_str())
            .ok()
            .map(|code| (found.range(), code))
    })
}

/// File that holds the raw bytes of an image: the first `FILE` of a sheet.
async fn raw_source(image_path: &Path) -> ProductCodeResult<PathBuf> {
    if !has_extension(image_path, "cue") {
        return Ok(image_path.to_path_buf());
    }

    let sheet = CueParser::new(image_path).parse().await?;
    let file = sheet
        .files
        .first()
        .ok_or_else(|| ProductCodeError::CodeNotFound(image_path.display().to_string()))?;
    let cue_dir = image_path.parent().unwrap_or(Path::new("."));
    Ok(cue_dir.join(&file.filename))
}

async fn extract_from_image(image_path: &Path) -> ProductCodeResult<ExtractedCode> {
    let image = open_image(image_path).await?;
    let mut fs = IsoFilesystem::mount(image).await?;
    extract_from_filesystem(&mut fs).await
}

/// Reads the code from the disc filesystem, falling back to a raw scan only
/// when the structured lookup fails.
pub async fn extract_code(image_path: &Path) -> ProductCodeResult<ExtractedCode> {
    match extract_from_image(image_path).await {
        Ok(code) => return Ok(code),
        Err(e) => warn!(
            "No code in the filesystem of {} ({e}), scanning raw bytes",
            image_path.display()
        ),
    }

    let source = raw_source(image_path).await?;
    let mut reader = BufReader::new(File::open(&source).await?);

    scan_raw(&mut reader)
        .await?
        .map(|code| ExtractedCode::new(code, CodeSource::RawScan))
        .ok_or_else(|| ProductCodeError::CodeNotFound(image_path.display().to_string()))
}

/// Prefers a code in the file name over reading the image.
pub async fn identify(image_path: &Path) -> ProductCodeResult<ExtractedCode> {
    if let Some(code) = find_in_file_name(&file_stem(image_path)) {
        return Ok(ExtractedCode::new(code, CodeSource::FileName));
    }

    extract_code(image_path).await
}
