pub mod datafile;
pub mod store;
pub mod tree;
pub mod writer;

pub use datafile::{DataFile, Group};
pub use store::MetadataStore;
pub use writer::MetadataWriter;
