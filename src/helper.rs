use std::path::PathBuf;

use image::{Rgb, RgbaImage};
use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};

use crate::compositor::{Compositor, CompositorConfig, LogoAsset};
use crate::encoder::{encode, EncodingRequest, BLACK};
use crate::error::{Error, Result};
use crate::exporter::{export, DirectorySink, ExportFormat, ExportRecord, NameStyle};

/*---- Utilities ----*/

/// Default output directory for [`generate_image`].
pub const DEFAULT_DIRECTORY: &str = "generated";

/// Generates the SVG markup of a black QR code for the provided content.
///
/// # Example
///
/// ```
/// use arkcode::helper::generate_svg_string;
///
/// let svg = generate_svg_string("Hello, World!").unwrap();
/// assert!(svg.contains("<svg"));
/// ```
pub fn generate_svg_string(content: &str) -> Result<String> {
    Ok(encode(&EncodingRequest::new(content, BLACK))?.svg)
}

/// Generates a QR code image buffer at the default resolution.
///
/// # Arguments
///
/// * `content` - The content to encode into the QR code.
/// * `color` - Optional. Foreground colour as `[r, g, b]`, black if not provided.
/// * `logo` - Optional. Logo stamped in the centre with rounded corners.
///
/// # Example
///
/// ```
/// use arkcode::helper::generate_image_buffer;
///
/// let img = generate_image_buffer("Hello, World!", Some([255, 165, 0]), None).unwrap();
/// assert_eq!(img.dimensions(), (1024, 1024));
/// ```
pub fn generate_image_buffer(content: &str, color: Option<[u8; 3]>, logo: Option<&LogoAsset>) -> Result<RgbaImage> {
    let request = EncodingRequest::new(content, color.map(Rgb).unwrap_or(BLACK));
    let vector = encode(&request)?;
    let composite = Compositor::new(CompositorConfig::default()).compose(&vector, logo)?;
    Ok(composite.into_image())
}

/// Generates a QR code for the provided content and saves it as PNG.
///
/// # Arguments
///
/// * `content` - The content to encode into the QR code.
/// * `directory` - Optional. The directory where the image will be saved. If not provided, the default directory is "generated".
/// * `filename` - Optional. The file name without extension. If not provided, it is derived from the content, e.g. `example.com_qr`.
///
/// # Returns
///
/// The path of the written file.
///
/// # Example
///
/// ```no_run
/// use arkcode::helper::generate_image;
///
/// generate_image("https://example.com", Some("images"), None).unwrap();
/// ```
pub fn generate_image(content: &str, directory: Option<&str>, filename: Option<&str>) -> Result<PathBuf> {
    let vector = encode(&EncodingRequest::new(content, BLACK))?;
    let composite = Compositor::new(CompositorConfig::default()).compose(&vector, None)?;

    let mut record = ExportRecord::new(content, ExportFormat::Png, NameStyle::Styled);
    if let Some(name) = filename {
        record.file_name = format!("{}.png", name);
    }
    let mut sink = DirectorySink::new(directory.unwrap_or(DEFAULT_DIRECTORY));
    export(&composite, &record, &mut sink)
}

/// Renders the QR code as text using half-height block characters. Colours are inverted
/// so the code scans on a dark terminal background.
///
/// Pass the same `ecc` used for the exported image, otherwise the preview may show a
/// different version of the symbol.
pub fn to_terminal_string(content: &str, ecc: EcLevel) -> Result<String> {
    if content.trim().is_empty() {
        return Err(Error::EmptyInput);
    }
    let code = QrCode::with_error_correction_level(content.as_bytes(), ecc)?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Prints the QR code to the console.
pub fn print_qr(content: &str, ecc: EcLevel) -> Result<()> {
    println!("{}", to_terminal_string(content, ecc)?);
    Ok(())
}
