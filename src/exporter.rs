//! Serializes a composite and hands it to a download target.

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::compositor::RasterComposite;
use crate::error::Result;

/// Base name used when nothing usable is left of the input text.
pub const DEFAULT_BASE_NAME: &str = "qrcode";
/// Longest base name in bytes, leaving room for the suffix under the usual 255 byte limit.
pub const MAX_BASE_NAME_LEN: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Png,
    Jpg,
    Jpeg,
    Tiff,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [Self::Png, Self::Jpg, Self::Jpeg, Self::Tiff];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpg | Self::Jpeg => "image/jpeg",
            Self::Tiff => "image/tiff",
        }
    }

    fn codec(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpg | Self::Jpeg => ImageFormat::Jpeg,
            Self::Tiff => ImageFormat::Tiff,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported format {s:?}, expected one of png, jpg, jpeg, tiff"))
    }
}

/// Which filename suffix to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NameStyle {
    /// `<base>_qr.<ext>`
    #[default]
    Styled,
    /// `<base>_arkcode.png`, PNG only.
    Legacy,
}

/// Name and format of one download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportRecord {
    pub file_name: String,
    pub format: ExportFormat,
}

impl ExportRecord {
    pub fn new(text: &str, format: ExportFormat, style: NameStyle) -> Self {
        let base = derive_base_name(text);
        match style {
            NameStyle::Styled => Self {
                file_name: format!("{}_qr.{}", base, format.extension()),
                format,
            },
            NameStyle::Legacy => Self {
                file_name: format!("{}_arkcode.png", base),
                format: ExportFormat::Png,
            },
        }
    }
}

/// Strips an `http://` or `https://` prefix and keeps everything before the first `/`.
///
/// Characters that are not allowed in file names become `_`, and the result is cut to
/// [`MAX_BASE_NAME_LEN`] bytes on a character boundary.
///
/// ```
/// use arkcode::exporter::derive_base_name;
///
/// assert_eq!(derive_base_name("https://example.com/page"), "example.com");
/// assert_eq!(derive_base_name(""), "qrcode");
/// ```
pub fn derive_base_name(text: &str) -> String {
    let cleaned = text
        .strip_prefix("https://")
        .or_else(|| text.strip_prefix("http://"))
        .unwrap_or(text);
    let base = cleaned.split('/').next().unwrap_or_default();
    if base.is_empty() {
        return DEFAULT_BASE_NAME.to_string();
    }

    let mut name = String::with_capacity(base.len().min(MAX_BASE_NAME_LEN));
    for c in base.chars() {
        let c = if is_reserved(c) { '_' } else { c };
        if name.len() + c.len_utf8() > MAX_BASE_NAME_LEN {
            break;
        }
        name.push(c);
    }
    name
}

// Rejected by at least one common filesystem.
fn is_reserved(c: char) -> bool {
    c.is_control() || matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Encodes the composite in the given format. JPEG has no alpha channel, so it is
/// flattened to RGB first.
pub fn encode_image(composite: &RasterComposite, format: ExportFormat) -> Result<Vec<u8>> {
    let image = DynamicImage::ImageRgba8(composite.image().clone());
    let image = match format.codec() {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format.codec())?;
    Ok(buffer.into_inner())
}

/// `data:<mime>;base64,...` for embedding the composite directly as an image source.
pub fn to_data_url(composite: &RasterComposite, format: ExportFormat) -> Result<String> {
    let bytes = encode_image(composite, format)?;
    Ok(format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes)))
}

/// Destination for downloaded files.
pub trait FileSink {
    /// Stores `bytes` under `file_name` and returns where they ended up.
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes downloads into a directory, creating it on first use. Existing files with the
/// same name are overwritten.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl FileSink for DirectorySink {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if !self.directory.exists() {
            fs::create_dir_all(&self.directory)?;
        }
        let path = self.directory.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Encodes the composite and saves it once through `sink`.
pub fn export(composite: &RasterComposite, record: &ExportRecord, sink: &mut dyn FileSink) -> Result<PathBuf> {
    let bytes = encode_image(composite, record.format)?;
    debug!(file = %record.file_name, size = composite.size(), bytes = bytes.len(), "encoded export");
    let path = sink.save(&record.file_name, &bytes)?;
    info!(path = %path.display(), format = %record.format, "saved QR code");
    Ok(path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compositor::{Compositor, CompositorConfig};
    use crate::encoder::{encode, EncodingRequest, BLACK};

    /// Keeps every save in memory.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub saved: Vec<(String, Vec<u8>)>,
    }

    impl FileSink for RecordingSink {
        fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
            self.saved.push((file_name.to_string(), bytes.to_vec()));
            Ok(PathBuf::from(file_name))
        }
    }

    fn composite() -> RasterComposite {
        let vector = encode(&EncodingRequest::new("example.com", BLACK)).unwrap();
        Compositor::new(CompositorConfig::with_size(128)).compose(&vector, None).unwrap()
    }

    #[test]
    fn test_derive_base_name() {
        assert_eq!(derive_base_name("https://example.com/page"), "example.com");
        assert_eq!(derive_base_name("http://example.com"), "example.com");
        assert_eq!(derive_base_name("example.com/page"), "example.com");
        assert_eq!(derive_base_name("example.com/a/b"), "example.com");
        assert_eq!(derive_base_name(""), DEFAULT_BASE_NAME);
        assert_eq!(derive_base_name("https://"), DEFAULT_BASE_NAME);
        assert_eq!(derive_base_name("/leading"), DEFAULT_BASE_NAME);
        // Only a leading scheme is stripped.
        assert_eq!(derive_base_name("ftp://host"), "ftp_");
    }

    #[test]
    fn test_derive_base_name_sanitizes() {
        assert_eq!(derive_base_name("a\\b:c*d?e\"f<g>h|i"), "a_b_c_d_e_f_g_h_i");
        assert_eq!(derive_base_name("tab\there\0nul"), "tab_here_nul");
        assert_eq!(derive_base_name("example.com:8080/x"), "example.com_8080");
    }

    #[test]
    fn test_derive_base_name_caps_length() {
        assert_eq!(derive_base_name(&"a".repeat(300)).len(), MAX_BASE_NAME_LEN);

        // Two-byte characters are never split.
        let name = derive_base_name(&"é".repeat(150));
        assert_eq!(name.len(), MAX_BASE_NAME_LEN);
        assert!(name.chars().all(|c| c == 'é'));

        let name = derive_base_name(&format!("a{}", "é".repeat(150)));
        assert_eq!(name.len(), MAX_BASE_NAME_LEN - 1);
    }

    #[test]
    fn test_long_text_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let record = ExportRecord::new(&"a".repeat(300), ExportFormat::Png, NameStyle::Styled);
        let path = export(&composite(), &record, &mut sink).unwrap();

        assert!(path.exists());
        assert_eq!(record.file_name.len(), MAX_BASE_NAME_LEN + "_qr.png".len());
    }

    #[test]
    fn test_export_record_names() {
        let styled = ExportRecord::new("https://example.com/page", ExportFormat::Tiff, NameStyle::Styled);
        assert_eq!(styled.file_name, "example.com_qr.tiff");

        let fallback = ExportRecord::new("", ExportFormat::Jpg, NameStyle::Styled);
        assert_eq!(fallback.file_name, "qrcode_qr.jpg");

        let legacy = ExportRecord::new("example.com/page", ExportFormat::Jpeg, NameStyle::Legacy);
        assert_eq!(legacy.file_name, "example.com_arkcode.png");
        assert_eq!(legacy.format, ExportFormat::Png);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert_eq!("jpeg".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert!("gif".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_encode_every_format() {
        let composite = composite();
        for format in ExportFormat::ALL {
            let bytes = encode_image(&composite, format).unwrap();
            assert_eq!(image::guess_format(&bytes).unwrap(), format.codec());
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (128, 128), "{format}");
        }
    }

    #[test]
    fn test_data_url() {
        let url = to_data_url(&composite(), ExportFormat::Png).unwrap();
        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_export_saves_once() {
        let mut sink = RecordingSink::default();
        let record = ExportRecord::new("example.com", ExportFormat::Jpg, NameStyle::Styled);
        export(&composite(), &record, &mut sink).unwrap();

        assert_eq!(sink.saved.len(), 1);
        assert_eq!(sink.saved[0].0, "example.com_qr.jpg");
        assert!(sink.saved[0].0.ends_with(".jpg"));
    }

    #[test]
    fn test_directory_sink_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("nested"));
        let path = sink.save("a.png", b"abc").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"abc");
        sink.save("a.png", b"xyz").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"xyz");
    }
}
