use crate::product_code::error::{ProductCodeError, ProductCodeResult};
use crate::product_code::models::ProductCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ps1,
    Ps2,
}

/// Boot configuration file found at the root of PlayStation discs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCnf {
    pub platform: Platform,
    pub boot_path: String,
    pub vmode: Option<String>,
    pub version: Option<String>,
}

impl SystemCnf {
    /// Parses `KEY = VALUE` lines. `BOOT2` wins over `BOOT` when both exist.
    pub fn parse(text: &str) -> ProductCodeResult<Self> {
        let mut boot = None;
        let mut boot2 = None;
        let mut vmode = None;
        let mut version = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_end_matches('\0').to_string();

            match key.trim().to_ascii_uppercase().as_str() {
                "BOOT" => boot = boot.or(Some(value)),
                "BOOT2" => boot2 = boot2.or(Some(value)),
                "VMODE" => vmode = Some(value),
                "VER" => version = Some(value),
                _ => {}
            }
        }

        let (platform, boot_path) = match (boot2, boot) {
            (Some(path), _) => (Platform::Ps2, path),
            (None, Some(path)) => (Platform::Ps1, path),
            (None, None) => return Err(ProductCodeError::MissingBootLine),
        };

        Ok(Self {
            platform,
            boot_path,
            vmode,
            version,
        })
    }

    pub fn product_code(&self) -> ProductCodeResult<ProductCode> {
        ProductCode::from_boot_path(&self.boot_path)
    }
}
