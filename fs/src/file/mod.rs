pub mod deleter;
pub mod reader;
pub mod renamer;
pub mod writer;

/// Default, unmocked implementation of the file traits in this module, backed
/// directly by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFile;
