//! Input checks shared by the handlers.

use serde::Deserialize;

/// Largest accepted profile picture, in bytes.
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

pub(crate) const MIN_PASSWORD_LEN: usize = 6;
pub(crate) const MIN_USERNAME_LEN: usize = 3;
pub(crate) const MAX_BIO_LEN: usize = 200;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_PER_PAGE: u64 = 10;
const MAX_PER_PAGE: u64 = 100;

/// Whether `email` is a bare `local@domain` address.
///
/// Display-name forms like `Ada <ada@example.com>` and surrounding
/// whitespace are rejected.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local.len() <= 64
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~.".contains(c));

    let domain_ok = !domain.is_empty()
        && domain.len() <= 255
        && domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    local_ok && domain_ok
}

/// `?page=&per_page=` query. Values are kept raw so that garbage falls back
/// to the defaults instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl PageParams {
    /// 1-based page; anything unparsable or below 1 means the first page.
    pub fn page(&self) -> u64 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|&page| page > 0)
            .unwrap_or(DEFAULT_PAGE)
    }

    /// Page size in `1..=100`; anything else means 10.
    pub fn per_page(&self) -> u64 {
        self.per_page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|per_page| (1..=MAX_PER_PAGE).contains(per_page))
            .unwrap_or(DEFAULT_PER_PAGE)
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

/// Image formats accepted for profile pictures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    /// Extension used for the stored file.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Gif => ".gif",
        }
    }
}

/// Detects the image format from its leading bytes.
pub fn sniff_image(bytes: &[u8]) -> Option<ImageKind> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageKind::Jpeg)
    } else if bytes.starts_with(PNG) {
        Some(ImageKind::Png)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(ImageKind::Gif)
    } else {
        None
    }
}

/// Whether the client-supplied filename carries an image extension.
pub(crate) fn has_image_extension(filename: &str) -> bool {
    let Some((_, ext)) = filename.rsplit_once('.') else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "gif"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        for ok in ["ada@example.com", "a.b+tag@mail.example.org", "x@localhost"] {
            assert!(is_valid_email(ok), "{ok} should be valid");
        }
        for bad in [
            "",
            "ada",
            "@example.com",
            "ada@",
            "Ada <ada@example.com>",
            " ada@example.com",
            "ada@example..com",
            "ada.@example.com",
            "ada@-example.com",
        ] {
            assert!(!is_valid_email(bad), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn test_page_params_defaults() {
        let params = PageParams::default();
        assert_eq!((params.page(), params.per_page(), params.offset()), (1, 10, 0));

        let params = PageParams {
            page: Some("3".into()),
            per_page: Some("25".into()),
        };
        assert_eq!((params.page(), params.per_page(), params.offset()), (3, 25, 50));
    }

    #[test]
    fn test_page_params_fall_back_on_garbage() {
        let params = PageParams {
            page: Some("0".into()),
            per_page: Some("101".into()),
        };
        assert_eq!((params.page(), params.per_page()), (1, 10));

        let params = PageParams {
            page: Some("-2".into()),
            per_page: Some("abc".into()),
        };
        assert_eq!((params.page(), params.per_page()), (1, 10));
    }

    #[test]
    fn test_sniff_image() {
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some(ImageKind::Jpeg));
        assert_eq!(sniff_image(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), Some(ImageKind::Png));
        assert_eq!(sniff_image(b"GIF89a\x01\x00"), Some(ImageKind::Gif));
        assert_eq!(sniff_image(b"<html>"), None);
        assert_eq!(sniff_image(b""), None);
        assert_eq!(ImageKind::Jpeg.extension(), ".jpg");
    }

    #[test]
    fn test_image_extension() {
        assert!(has_image_extension("me.JPEG"));
        assert!(has_image_extension("a.b.png"));
        assert!(!has_image_extension("me.webp"));
        assert!(!has_image_extension("png"));
    }
}
