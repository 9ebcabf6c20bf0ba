use crate::product_code::error::{ProductCodeError, ProductCodeResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

lazy_static! {
    static ref CODE_RE: Regex = Regex::new(r"(?i)^([a-z]{4})[-_](\d{3}\.\d{2}|\d{3,5})$").unwrap();
    static ref BOOT_FILE_RE: Regex = Regex::new(r"(?i)^[a-z]{4}[-_](\d{3}\.?\d{2}|\d{5})$").unwrap();
}

const MAX_NUMBER: u32 = 99_999;

/// A disc product code such as `SLUS-01234`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductCode {
    family: String,
    number: u32,
}

impl ProductCode {
    pub fn new(family: &str, number: u32) -> ProductCodeResult<Self> {
        if family.len() != 4 || !family.chars().all(|c| c.is_ascii_alphabetic()) || number > MAX_NUMBER {
            return Err(ProductCodeError::InvalidCode(format!("{family}-{number}")));
        }

        Ok(Self {
            family: family.to_ascii_uppercase(),
            number,
        })
    }

    /// Accepts `SLUS_012.34`, `slus-01234`, `SCES_1234` and the canonical form.
    pub fn parse(token: &str) -> ProductCodeResult<Self> {
        let invalid = || ProductCodeError::InvalidCode(token.to_string());
        let caps = CODE_RE.captures(token.trim()).ok_or_else(invalid)?;

        let digits = caps[2].replace('.', "");
        let number = digits.parse::<u32>().map_err(|_| invalid())?;
        Self::new(&caps[1], number)
    }

    /// Code of the boot executable named by a `SYSTEM.CNF` boot line, for
    /// example `cdrom0:\SLUS_012.34;1`.
    pub fn from_boot_path(path: &str) -> ProductCodeResult<Self> {
        let file_name = path
            .rsplit(['\\', '/', ':'])
            .next()
            .unwrap_or(path)
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();

        if !BOOT_FILE_RE.is_match(file_name) {
            return Err(ProductCodeError::InvalidCode(path.to_string()));
        }
        Self::parse(file_name)
    }
}

impl Display for ProductCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:05}", self.family, self.number)
    }
}

impl FromStr for ProductCode {
    type Err = ProductCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    Filesystem,
    FileName,
    RawScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCode {
    pub code: ProductCode,
    pub source: CodeSource,
    pub confidence: Confidence,
}

impl ExtractedCode {
    pub fn new(code: ProductCode, source: CodeSource) -> Self {
        let confidence = match source {
            CodeSource::Filesystem | CodeSource::FileName => Confidence::High,
            CodeSource::RawScan => Confidence::Low,
        };

        Self {
            code,
            source,
            confidence,
        }
    }
}

impl Display for ExtractedCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?}, {:?} confidence)", self.code, self.source, self.confidence)
    }
}
