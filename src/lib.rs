pub mod buffer;
pub mod error;
pub mod stream;

pub use buffer::{BufferConfig, ChunkedBuffer};
pub use error::{Error, Result};
pub use stream::ChunkedByteStream;
