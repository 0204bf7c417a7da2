use thiserror::Error;

/// Everything that can go wrong between the text field and the saved file.
#[derive(Error, Debug)]
pub enum Error {
    #[error("input text is empty")]
    EmptyInput,

    #[error("input is not a link: {0:?}")]
    InvalidLink(String),

    #[error("invalid color {0:?}, expected #rgb or #rrggbb")]
    InvalidColor(String),

    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("compositing failed: {0}")]
    Composite(String),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no QR code has been generated for the current input")]
    NotReady,
}

impl Error {
    /// True for failures caused by what the user typed, as opposed to the pipeline.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::EmptyInput | Error::InvalidLink(_) | Error::InvalidColor(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
