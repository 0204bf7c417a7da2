//! # arkcode
//!
//! A Rust library for turning a link or any text into a high-resolution QR code image.
//!
//! `arkcode` encodes the text at the highest error correction level and renders the symbol
//! from vector markup, so the output is sharp at any size. The foreground can be tinted. A
//! logo can be stamped in the centre with rounded corners. The result can be saved as PNG,
//! JPG/JPEG or TIFF, or embedded as a `data:` URL.
//!
//! ## Features
//!
//! - Vector first rendering: text → SVG → 1024×1024 bitmap, no upscaled pixels.
//! - Custom foreground colour on a white background.
//! - Centred logo, 20% of the edge, clipped to a rounded square.
//! - Export to PNG, JPG, JPEG or TIFF with a filename derived from the link.
//! - A legacy mode reproducing the first release's black-and-white `_arkcode.png` output.
//!
//! ## Example
//!
//! Generate a tinted QR code with a logo and save it:
//!
//! ```no_run
//! use arkcode::{DirectorySink, ExportFormat, Generator, LogoAsset};
//!
//! fn main() -> arkcode::Result<()> {
//!     let mut generator = Generator::new();
//!     generator.set_text("https://example.com/page");
//!     generator.set_color_hex("#ffa500")?;
//!     generator.set_logo(LogoAsset::open("logo.png")?);
//!     generator.generate()?;
//!
//!     let mut sink = DirectorySink::new("output");
//!     generator.download(ExportFormat::Png, &mut sink)?; // output/example.com_qr.png
//!     Ok(())
//! }
//! ```
//!
//! Generate an in-memory image buffer:
//!
//! ```rust
//! use arkcode::helper::generate_image_buffer;
//!
//! let img = generate_image_buffer("Hello, World!", None, None).unwrap();
//! assert_eq!(img.width(), 1024);
//! ```
//!
//! ## Modules
//!
//! - [`encoder`]: text to SVG markup.
//! - [`compositor`]: SVG to bitmap, logo overlay.
//! - [`exporter`]: file formats, file names and download targets.
//! - [`generator`]: the stateful pipeline driver.
//! - [`helper`]: one-call shortcuts and console output.

#![forbid(unsafe_code)]

pub mod compositor;
pub mod encoder;
pub mod error;
pub mod exporter;
pub mod generator;
pub mod helper;

pub use compositor::{Compositor, CompositorConfig, LogoAsset, RasterComposite};
pub use encoder::{encode, parse_hex_color, EncodingRequest, VectorImage};
pub use error::{Error, Result};
pub use exporter::{derive_base_name, DirectorySink, ExportFormat, ExportRecord, FileSink, NameStyle};
pub use generator::{Generator, InputRule, Mode, Phase};
