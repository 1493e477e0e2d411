pub mod deleter;
pub mod reader;
pub mod renamer;
pub mod writer;

/// Marker type implementing the file operation traits against the real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFile;
