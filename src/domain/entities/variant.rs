use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Canonical display sizes derived from every stored original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantName {
    Thumbnail,
    Small,
    Medium,
    Large,
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub name: VariantName,
    /// `None` keeps the source dimensions (re-encode only).
    pub target: Option<(u32, u32)>,
    pub quality: u8,
}

pub const VARIANT_SPECS: [VariantSpec; 5] = [
    VariantSpec { name: VariantName::Thumbnail, target: Some((150, 150)), quality: 80 },
    VariantSpec { name: VariantName::Small, target: Some((400, 300)), quality: 85 },
    VariantSpec { name: VariantName::Medium, target: Some((800, 600)), quality: 85 },
    VariantSpec { name: VariantName::Large, target: Some((1200, 900)), quality: 90 },
    VariantSpec { name: VariantName::Original, target: None, quality: 95 },
];

impl VariantName {
    pub const ALL: [VariantName; 5] = [
        VariantName::Thumbnail,
        VariantName::Small,
        VariantName::Medium,
        VariantName::Large,
        VariantName::Original,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantName::Thumbnail => "thumbnail",
            VariantName::Small => "small",
            VariantName::Medium => "medium",
            VariantName::Large => "large",
            VariantName::Original => "original",
        }
    }

    pub fn spec(&self) -> VariantSpec {
        VARIANT_SPECS
            .into_iter()
            .find(|spec| spec.name == *self)
            .unwrap_or(VARIANT_SPECS[4])
    }
}

impl FromStr for VariantName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VariantName::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::InvalidInput(format!(
                "Invalid size '{}'. Expected one of: thumbnail, small, medium, large, original", s
            )))
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpeg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Webp, OutputFormat::Jpeg];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    /// An explicit `format` query wins; otherwise WebP only when the client
    /// advertises it in `Accept`. JPEG is the fallback.
    pub fn negotiate(requested: Option<&str>, accept: Option<&str>) -> Result<Self, AppError> {
        match requested.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("webp") => Ok(OutputFormat::Webp),
            Some("jpeg") | Some("jpg") => Ok(OutputFormat::Jpeg),
            None | Some("") | Some("auto") => Ok(if accepts_webp(accept) {
                OutputFormat::Webp
            } else {
                OutputFormat::Jpeg
            }),
            Some(other) => Err(AppError::InvalidInput(format!(
                "Invalid format '{}'. Expected one of: auto, webp, jpeg", other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpeg",
        })
    }
}

fn accepts_webp(accept: Option<&str>) -> bool {
    accept
        .map(|header| {
            header.split(',').any(|entry| {
                let mut parts = entry.split(';');
                let media = parts.next().unwrap_or("").trim();
                let refused = parts.any(|p| matches!(p.trim(), "q=0" | "q=0.0" | "q=0.00" | "q=0.000"));
                media.eq_ignore_ascii_case("image/webp") && !refused
            })
        })
        .unwrap_or(false)
}

/// A derived, re-encoded copy of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVariant {
    pub name: VariantName,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub size: u64,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInfo {
    pub name: VariantName,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub size: u64,
    pub compression_ratio: String,
}

impl ImageVariant {
    pub fn to_info(&self, original_size: u64) -> VariantInfo {
        VariantInfo {
            name: self.name,
            format: self.format,
            width: self.width,
            height: self.height,
            quality: self.quality,
            size: self.size,
            compression_ratio: compression_ratio(original_size, self.size),
        }
    }
}

/// Space saved relative to the original, formatted with one decimal.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> String {
    if original_size == 0 {
        return "0.0%".to_string();
    }
    let saved = (original_size as f64 - compressed_size as f64) / original_size as f64;
    format!("{:.1}%", saved * 100.0)
}

/// `{stem}-{variant}.{ext}` for an original named `{stem}.{orig_ext}`.
pub fn variant_file_name(filename: &str, variant: VariantName, format: OutputFormat) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(filename);
    format!("{}-{}.{}", stem, variant, format.extension())
}

/// Inverse of [`variant_file_name`]: the original stem and variant a processed file belongs to.
pub fn parse_variant_file_name(file_name: &str) -> Option<(&str, VariantName)> {
    let (base, ext) = file_name.rsplit_once('.')?;
    if !OutputFormat::ALL.iter().any(|f| f.extension() == ext) {
        return None;
    }
    let (stem, variant) = base.rsplit_once('-')?;
    let variant = VariantName::ALL.into_iter().find(|v| v.as_str() == variant)?;
    Some((stem, variant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_ratio_uses_one_decimal() {
        assert_eq!(compression_ratio(1_000_000, 250_000), "75.0%");
        assert_eq!(compression_ratio(3, 2), "33.3%");
        assert_eq!(compression_ratio(0, 10), "0.0%");
    }

    #[test]
    fn specs_match_canonical_sizes() {
        assert_eq!(VariantName::Thumbnail.spec().target, Some((150, 150)));
        assert_eq!(VariantName::Small.spec().quality, 85);
        assert_eq!(VariantName::Medium.spec().target, Some((800, 600)));
        assert_eq!(VariantName::Large.spec().quality, 90);
        assert_eq!(VariantName::Original.spec().target, None);
        assert_eq!(VariantName::Original.spec().quality, 95);
    }

    #[test]
    fn negotiation_prefers_explicit_format() {
        assert_eq!(OutputFormat::negotiate(Some("jpeg"), Some("image/webp")).unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::negotiate(Some("webp"), None).unwrap(), OutputFormat::Webp);
        assert!(OutputFormat::negotiate(Some("gif"), None).is_err());
    }

    #[test]
    fn negotiation_reads_accept_header() {
        let chrome = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";
        assert_eq!(OutputFormat::negotiate(None, Some(chrome)).unwrap(), OutputFormat::Webp);
        assert_eq!(OutputFormat::negotiate(Some("auto"), Some("image/*")).unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::negotiate(None, Some("image/webp;q=0")).unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::negotiate(None, None).unwrap(), OutputFormat::Jpeg);
    }

    #[test]
    fn variant_names_round_trip() {
        let name = variant_file_name("gallery-1700000000000-123456789.jpeg", VariantName::Medium, OutputFormat::Webp);
        assert_eq!(name, "gallery-1700000000000-123456789-medium.webp");
        assert_eq!(
            parse_variant_file_name(&name),
            Some(("gallery-1700000000000-123456789", VariantName::Medium))
        );
        assert_eq!(parse_variant_file_name("notes.txt"), None);
        assert_eq!(parse_variant_file_name("photo-huge.jpg"), None);
    }
}
