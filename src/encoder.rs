//! Text to vector QR markup.
//!
//! The actual symbol encoding is done by the [`qrcode`] crate. This module fixes the
//! parameters (error correction, quiet zone, colors) and turns the module grid into SVG
//! that the compositor can rasterize at any resolution.

use image::Rgb;
use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

use crate::error::{Error, Result};

/// Quiet zone around the symbol, in modules.
pub const MARGIN: u32 = 4;

pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Parameters for a single encode. Built fresh on every generate.
#[derive(Clone, Debug)]
pub struct EncodingRequest {
    pub text: String,
    pub foreground: Rgb<u8>,
    pub background: Rgb<u8>,
    pub ecc: EcLevel,
    pub margin: u32,
}

impl EncodingRequest {
    /// A styled request: the given foreground on white, error correction level H.
    pub fn new(text: impl Into<String>, foreground: Rgb<u8>) -> Self {
        Self {
            text: text.into(),
            foreground,
            background: WHITE,
            ecc: EcLevel::H,
            margin: MARGIN,
        }
    }

    /// Black on white at level M, the defaults of the first release.
    pub fn legacy(text: impl Into<String>) -> Self {
        Self {
            ecc: EcLevel::M,
            ..Self::new(text, BLACK)
        }
    }
}

/// Scalable QR representation. `modules` is the full edge length in modules, quiet
/// zone included, and matches the SVG viewBox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorImage {
    pub svg: String,
    pub modules: u32,
}

/// Encodes the request text and returns the symbol as SVG markup.
///
/// # Errors
///
/// [`Error::EmptyInput`] for blank text, [`Error::Encode`] when the text does not fit
/// in a version 40 symbol at the requested level.
pub fn encode(request: &EncodingRequest) -> Result<VectorImage> {
    if request.text.trim().is_empty() {
        return Err(Error::EmptyInput);
    }
    let code = QrCode::with_error_correction_level(request.text.as_bytes(), request.ecc)?;
    debug!(
        version = ?code.version(),
        width = code.width(),
        ecc = ?request.ecc,
        "encoded QR symbol"
    );
    Ok(to_svg(&code, request))
}

// One unit square per dark module. crispEdges keeps module borders sharp after scaling
// and the background flush with the canvas edge.
fn to_svg(code: &QrCode, request: &EncodingRequest) -> VectorImage {
    let width = code.width();
    let modules = width as u32 + 2 * request.margin;
    let mut svg = String::new();
    svg += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    svg += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{0}\" height=\"{0}\" viewBox=\"0 0 {0} {0}\" stroke=\"none\" shape-rendering=\"crispEdges\">\n",
        modules
    );
    svg += &format!(
        "\t<rect x=\"0\" y=\"0\" width=\"{0}\" height=\"{0}\" fill=\"{1}\"/>\n",
        modules,
        to_hex(request.background)
    );
    svg += "\t<path d=\"";
    let mut first = true;
    for (index, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        if !first {
            svg += " ";
        }
        first = false;
        let x = (index % width) as u32 + request.margin;
        let y = (index / width) as u32 + request.margin;
        svg += &format!("M{},{}h1v1h-1z", x, y);
    }
    svg += &format!("\" fill=\"{}\"/>\n", to_hex(request.foreground));
    svg += "</svg>\n";
    VectorImage { svg, modules }
}

/// Formats a color as `#rrggbb`.
pub fn to_hex(color: Rgb<u8>) -> String {
    let [r, g, b] = color.0;
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Parses `#rrggbb`, `rrggbb` or the short `#rgb` form.
pub fn parse_hex_color(value: &str) -> Result<Rgb<u8>> {
    let invalid = || Error::InvalidColor(value.to_string());
    let hex = value.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match hex.len() {
        6 => Ok(Rgb([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?])),
        3 => {
            let mut out = [0u8; 3];
            for (slot, digit) in out.iter_mut().zip(hex.chars()) {
                *slot = channel(&digit.to_string())? * 17;
            }
            Ok(Rgb(out))
        }
        _ => Err(invalid()),
    }
}
