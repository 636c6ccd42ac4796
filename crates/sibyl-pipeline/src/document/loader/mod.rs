mod text;

#[cfg(feature = "pdf")]
mod pdf;

pub use text::TextLoader;

#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
