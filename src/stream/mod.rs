pub mod data_stream;
pub mod loader;

pub use data_stream::{DataStream, Label, Record, Stream};
pub use loader::Dataset;
