//! The form state behind a QR generator: what to encode, how it should look, and the
//! most recent result.

use std::path::PathBuf;

use image::Rgb;
use tracing::{debug, error, warn};

use crate::compositor::{Compositor, CompositorConfig, LogoAsset, RasterComposite};
use crate::encoder::{self, EncodingRequest, BLACK};
use crate::error::{Error, Result};
use crate::exporter::{self, ExportFormat, ExportRecord, FileSink, NameStyle};

pub const MSG_INVALID_LINK: &str = "Please enter a valid link";
pub const MSG_EMPTY_TEXT: &str = "Please enter some text";
pub const MSG_GENERATION_FAILED: &str = "Error generating QR code";

/// Where the generator is in a generation cycle. `Encoding` and `Compositing` are only
/// ever observed from inside [`Generator::generate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Encoding,
    Compositing,
    Ready,
}

/// What counts as acceptable input text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputRule {
    /// Any text that is not blank.
    #[default]
    Text,
    /// Non-blank and containing a `.`, e.g. `example.com`.
    Link,
}

impl InputRule {
    fn check(self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        if self == InputRule::Link && !text.contains('.') {
            return Err(Error::InvalidLink(text.to_string()));
        }
        Ok(())
    }

    fn message(self) -> &'static str {
        match self {
            InputRule::Text => MSG_EMPTY_TEXT,
            InputRule::Link => MSG_INVALID_LINK,
        }
    }
}

/// Which release's behaviour to reproduce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Colour, logo, high error correction, any export format.
    #[default]
    Styled,
    /// Black on white at level M, no logo, PNG named `<base>_arkcode.png`.
    Legacy,
}

/// Input collector and pipeline driver.
///
/// Any change to the inputs drops the previous result, and a download is only possible
/// after a successful [`generate`](Generator::generate). Generation borrows the generator
/// mutably, so two cycles can never run against the same state at once.
///
/// # Example
///
/// ```
/// use arkcode::{ExportFormat, Generator};
///
/// let mut generator = Generator::new();
/// generator.set_text("https://example.com/page");
/// generator.generate().unwrap();
/// assert!(generator.can_download());
///
/// let mut sink = arkcode::DirectorySink::new(std::env::temp_dir().join("arkcode-doc"));
/// let path = generator.download(ExportFormat::Png, &mut sink).unwrap();
/// assert!(path.ends_with("example.com_qr.png"));
/// ```
#[derive(Debug)]
pub struct Generator {
    text: String,
    color: Rgb<u8>,
    logo: Option<LogoAsset>,
    error: Option<&'static str>,
    phase: Phase,
    current: Option<RasterComposite>,
    compositor: Compositor,
    mode: Mode,
    rule: InputRule,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    pub fn new() -> Self {
        Self::with_config(CompositorConfig::default())
    }

    pub fn with_config(config: CompositorConfig) -> Self {
        Self {
            text: String::new(),
            color: BLACK,
            logo: None,
            error: None,
            phase: Phase::Idle,
            current: None,
            compositor: Compositor::new(config),
            mode: Mode::Styled,
            rule: InputRule::Text,
        }
    }

    /// Switches to first-release behaviour, which also requires link-shaped input.
    pub fn legacy(mut self) -> Self {
        self.mode = Mode::Legacy;
        self.rule = InputRule::Link;
        self
    }

    pub fn input_rule(mut self, rule: InputRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.invalidate();
    }

    pub fn set_color(&mut self, color: Rgb<u8>) {
        self.color = color;
        self.invalidate();
    }

    /// Sets the foreground from a hex string. An invalid value leaves the colour as it was.
    pub fn set_color_hex(&mut self, value: &str) -> Result<()> {
        let color = encoder::parse_hex_color(value)?;
        self.set_color(color);
        Ok(())
    }

    pub fn set_logo(&mut self, logo: LogoAsset) {
        if self.mode == Mode::Legacy {
            warn!("logos are ignored in legacy mode");
        }
        self.logo = Some(logo);
        self.invalidate();
    }

    pub fn clear_logo(&mut self) {
        self.logo = None;
        self.invalidate();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> Rgb<u8> {
        self.color
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// User facing message from the last failed generation, if any.
    pub fn error_message(&self) -> Option<&'static str> {
        self.error
    }

    pub fn composite(&self) -> Option<&RasterComposite> {
        self.current.as_ref()
    }

    pub fn can_download(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Runs the whole pipeline for the current inputs and replaces the previous result.
    ///
    /// On failure the previous result is gone, the phase is back to `Idle` and
    /// [`error_message`](Generator::error_message) holds a static message. The detailed
    /// cause is logged and also returned.
    pub fn generate(&mut self) -> Result<&RasterComposite> {
        self.current = None;
        self.error = None;

        match self.run_pipeline() {
            Ok(composite) => {
                self.phase = Phase::Ready;
                Ok(self.current.insert(composite))
            }
            Err(e) if e.is_input_error() => {
                debug!(error = %e, "rejected input");
                let message = self.rule.message();
                Err(self.fail(message, e))
            }
            Err(e) => {
                error!(error = %e, phase = ?self.phase, "error generating QR code");
                Err(self.fail(MSG_GENERATION_FAILED, e))
            }
        }
    }

    /// The encode parameters [`generate`](Generator::generate) uses for the current inputs.
    pub fn encoding_request(&self) -> EncodingRequest {
        match self.mode {
            Mode::Styled => EncodingRequest::new(self.text.as_str(), self.color),
            Mode::Legacy => EncodingRequest::legacy(self.text.as_str()),
        }
    }

    fn run_pipeline(&mut self) -> Result<RasterComposite> {
        self.rule.check(&self.text)?;

        self.phase = Phase::Encoding;
        let vector = encoder::encode(&self.encoding_request())?;

        self.phase = Phase::Compositing;
        let logo = match self.mode {
            Mode::Styled => self.logo.as_ref(),
            Mode::Legacy => None,
        };
        self.compositor.compose(&vector, logo)
    }

    /// `data:` URL of the current result, or `None` before a successful generate.
    pub fn image_source(&self) -> Result<Option<String>> {
        self.current
            .as_ref()
            .map(|composite| exporter::to_data_url(composite, ExportFormat::Png))
            .transpose()
    }

    /// The filename a download in `format` would get right now.
    pub fn export_record(&self, format: ExportFormat) -> ExportRecord {
        let style = match self.mode {
            Mode::Styled => NameStyle::Styled,
            Mode::Legacy => NameStyle::Legacy,
        };
        ExportRecord::new(&self.text, format, style)
    }

    /// Saves the current result through `sink`, exactly once per call.
    pub fn download(&self, format: ExportFormat, sink: &mut dyn FileSink) -> Result<PathBuf> {
        let composite = match (self.phase, self.current.as_ref()) {
            (Phase::Ready, Some(composite)) => composite,
            _ => return Err(Error::NotReady),
        };
        exporter::export(composite, &self.export_record(format), sink)
    }

    fn invalidate(&mut self) {
        self.phase = Phase::Idle;
        self.current = None;
    }

    fn fail(&mut self, message: &'static str, cause: Error) -> Error {
        self.phase = Phase::Idle;
        self.current = None;
        self.error = Some(message);
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::tests::RecordingSink;
    use image::DynamicImage;
    use qrcode::EcLevel;

    fn generator() -> Generator {
        Generator::with_config(CompositorConfig::with_size(200))
    }

    #[test]
    fn test_generate_sets_image_source() {
        let mut generator = generator();
        generator.set_text("example.com");
        generator.generate().unwrap();

        assert_eq!(generator.phase(), Phase::Ready);
        assert!(generator.can_download());
        assert!(generator.error_message().is_none());
        assert!(!generator.image_source().unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_generate_empty_text() {
        let mut generator = generator();
        assert!(matches!(generator.generate(), Err(Error::EmptyInput)));

        assert_eq!(generator.phase(), Phase::Idle);
        assert!(generator.image_source().unwrap().is_none());
        assert_eq!(generator.error_message(), Some(MSG_EMPTY_TEXT));
        assert!(!generator.can_download());
    }

    #[test]
    fn test_link_rule() {
        let mut generator = generator().input_rule(InputRule::Link);
        generator.set_text("not a link");
        assert!(matches!(generator.generate(), Err(Error::InvalidLink(_))));
        assert_eq!(generator.error_message(), Some(MSG_INVALID_LINK));

        generator.set_text("example.com");
        generator.generate().unwrap();
        assert!(generator.error_message().is_none());
    }

    #[test]
    fn test_failure_clears_previous_result() {
        let mut generator = generator();
        generator.set_text("example.com");
        generator.generate().unwrap();

        generator.set_text("x".repeat(4000));
        assert!(matches!(generator.generate(), Err(Error::Encode(_))));
        assert_eq!(generator.error_message(), Some(MSG_GENERATION_FAILED));
        assert!(generator.composite().is_none());
    }

    #[test]
    fn test_generate_is_idempotent() {
        let mut generator = generator();
        generator.set_text("https://example.com");
        generator.set_color_hex("#336699").unwrap();
        let first = generator.generate().unwrap().clone();
        let second = generator.generate().unwrap().clone();

        assert_eq!(first, second);
    }

    #[test]
    fn test_input_change_returns_to_idle() {
        let mut generator = generator();
        generator.set_text("example.com");
        generator.generate().unwrap();
        generator.set_color(Rgb([255, 0, 0]));

        assert_eq!(generator.phase(), Phase::Idle);
        let mut sink = RecordingSink::default();
        assert!(matches!(generator.download(ExportFormat::Png, &mut sink), Err(Error::NotReady)));
        assert!(sink.saved.is_empty());
    }

    #[test]
    fn test_invalid_color_keeps_previous() {
        let mut generator = generator();
        generator.set_color(Rgb([1, 2, 3]));
        assert!(generator.set_color_hex("#zzz").is_err());
        assert_eq!(generator.color(), Rgb([1, 2, 3]));
    }

    #[test]
    fn test_download_once_per_call() {
        let mut generator = generator();
        generator.set_text("https://example.com/page");
        generator.generate().unwrap();

        let mut sink = RecordingSink::default();
        for format in ExportFormat::ALL {
            generator.download(format, &mut sink).unwrap();
        }
        let names: Vec<_> = sink.saved.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            [
                "example.com_qr.png",
                "example.com_qr.jpg",
                "example.com_qr.jpeg",
                "example.com_qr.tiff"
            ]
        );
    }

    #[test]
    fn test_legacy_mode() {
        let mut generator = generator().legacy();
        generator.set_logo(LogoAsset::from(DynamicImage::new_rgb8(8, 8)));
        generator.set_color(Rgb([255, 0, 0]));
        generator.set_text("https://example.com/page");
        let composite = generator.generate().unwrap().clone();

        // Colour and logo are ignored.
        assert!(composite.image().pixels().all(|p| p.0 == [0, 0, 0, 255] || p.0 == [255, 255, 255, 255]));
        assert_eq!(generator.export_record(ExportFormat::Tiff).file_name, "example.com_arkcode.png");
    }

    #[test]
    fn test_legacy_request_level() {
        let mut styled = generator();
        styled.set_text("example.com");
        assert_eq!(styled.encoding_request().ecc, EcLevel::H);

        let mut legacy = generator().legacy();
        legacy.set_color(Rgb([255, 0, 0]));
        let request = legacy.encoding_request();
        assert_eq!(request.ecc, EcLevel::M);
        assert_eq!(request.foreground, BLACK);
    }

    #[test]
    fn test_logo_changes_output() {
        let mut generator = generator();
        generator.set_text("example.com");
        let plain = generator.generate().unwrap().clone();

        generator.set_logo(LogoAsset::from(DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            16,
            16,
            Rgb([255, 0, 0]),
        ))));
        let stamped = generator.generate().unwrap().clone();
        assert_ne!(plain, stamped);

        generator.clear_logo();
        assert_eq!(generator.generate().unwrap(), &plain);
    }
}
