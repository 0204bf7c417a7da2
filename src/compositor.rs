//! Rasterizes vector QR markup and stamps an optional logo on top.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use resvg::tiny_skia::{self, ColorU8, FillRule, Mask, PathBuilder, Pixmap, PixmapPaint, Transform};
use resvg::usvg;
use tracing::{debug, instrument};

use crate::encoder::VectorImage;
use crate::error::{Error, Result};

/// Output edge length in pixels.
pub const DEFAULT_SIZE: u32 = 1024;
/// Logo edge as a fraction of the output edge.
pub const LOGO_RATIO: f32 = 0.20;
/// Logo corner radius as a fraction of the logo edge.
pub const CORNER_RATIO: f32 = 0.08;

// Cubic Bezier control distance for a quarter circle of radius 1.
const KAPPA: f32 = 0.552_284_8;

/// Fixed rendering parameters, chosen once per [`Compositor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorConfig {
    pub size: u32,
    pub logo_ratio: f32,
    pub corner_ratio: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            logo_ratio: LOGO_RATIO,
            corner_ratio: CORNER_RATIO,
        }
    }
}

impl CompositorConfig {
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Logo placement as `(offset, edge, corner radius)`, all in output pixels. The
    /// logo never extends past the output.
    pub fn logo_geometry(&self) -> (u32, u32, f32) {
        let edge = (self.size as f32 * self.logo_ratio.clamp(0.0, 1.0)).floor() as u32;
        let offset = self.size.saturating_sub(edge) / 2;
        (offset, edge, edge as f32 * self.corner_ratio)
    }
}

/// A user supplied logo. Decoding is the only validation it gets.
#[derive(Clone, Debug)]
pub struct LogoAsset {
    image: DynamicImage,
}

impl LogoAsset {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            image: image::load_from_memory(bytes)?,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            image: image::open(path)?,
        })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl From<DynamicImage> for LogoAsset {
    fn from(image: DynamicImage) -> Self {
        Self { image }
    }
}

/// The finished bitmap of one generation cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterComposite {
    image: RgbaImage,
}

impl RasterComposite {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

#[derive(Clone, Debug, Default)]
pub struct Compositor {
    config: CompositorConfig,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self { config }
    }

    /// Renders `vector` to a `size x size` bitmap, then draws `logo` centred and
    /// clipped to a rounded square. The logo is always drawn after the code itself.
    ///
    /// No attempt is made to keep the result scannable: a logo covers whatever
    /// modules lie beneath it and relies on error correction to recover them.
    #[instrument(level = "debug", skip_all, fields(size = self.config.size, logo = logo.is_some()))]
    pub fn compose(&self, vector: &VectorImage, logo: Option<&LogoAsset>) -> Result<RasterComposite> {
        let size = self.config.size;
        let tree = usvg::Tree::from_str(&vector.svg, &usvg::Options::default())
            .map_err(|e| Error::Composite(format!("invalid QR markup: {e}")))?;
        let mut canvas = Pixmap::new(size, size)
            .ok_or_else(|| Error::Composite(format!("cannot allocate {size}x{size} canvas")))?;

        let tree_size = tree.size();
        let transform = Transform::from_scale(
            size as f32 / tree_size.width(),
            size as f32 / tree_size.height(),
        );
        resvg::render(&tree, transform, &mut canvas.as_mut());
        debug!(modules = vector.modules, "rasterized QR code");

        if let Some(logo) = logo {
            self.stamp_logo(&mut canvas, logo)?;
        }

        Ok(RasterComposite {
            image: to_rgba_image(&canvas),
        })
    }

    fn stamp_logo(&self, canvas: &mut Pixmap, logo: &LogoAsset) -> Result<()> {
        let (offset, edge, radius) = self.config.logo_geometry();
        if edge == 0 {
            return Err(Error::Composite("logo area is empty".to_string()));
        }

        let resized = imageops::resize(&logo.image().to_rgba8(), edge, edge, FilterType::Lanczos3);
        let mut stamp = Pixmap::new(edge, edge)
            .ok_or_else(|| Error::Composite(format!("cannot allocate {edge}x{edge} logo")))?;
        for (dst, src) in stamp.pixels_mut().iter_mut().zip(resized.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }

        let clip = rounded_square(offset as f32, offset as f32, edge as f32, radius)
            .ok_or_else(|| Error::Composite("invalid logo clip path".to_string()))?;
        let mut mask = Mask::new(canvas.width(), canvas.height())
            .ok_or_else(|| Error::Composite("cannot allocate clip mask".to_string()))?;
        mask.fill_path(&clip, FillRule::Winding, true, Transform::identity());

        canvas.draw_pixmap(
            offset as i32,
            offset as i32,
            stamp.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            Some(&mask),
        );
        debug!(offset, edge, radius, "stamped logo");
        Ok(())
    }
}

/// Square of side `edge` at `(x, y)` whose corners are quarter circles of `radius`.
pub fn rounded_square(x: f32, y: f32, edge: f32, radius: f32) -> Option<tiny_skia::Path> {
    let r = radius.clamp(0.0, edge / 2.0);
    let c = r * KAPPA;
    let (right, bottom) = (x + edge, y + edge);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.cubic_to(right - r + c, y, right, y + r - c, right, y + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + c, right - r + c, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.cubic_to(x + r - c, bottom, x, bottom - r + c, x, bottom - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - c, x + r - c, y, x + r, y);
    pb.close();
    pb.finish()
}

fn to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}
