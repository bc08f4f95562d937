//! Streaming generation: backend trait and byte-to-text decoding.

pub mod backend;
pub mod decoder;
pub mod utf8;

pub use backend::GenerationBackend;
pub use decoder::{ByteStream, FragmentStream, TextStream, text_stream};
pub use utf8::Utf8Decoder;
