pub mod header;
pub mod stream;

pub use header::{HEADER_SIZE, Header};
pub use stream::ChunkLayout;
