pub mod contract;
pub mod memory;

pub use contract::{ByteStream, FileContent, FileUpload, PutMode, StorageAdapter};
pub use memory::{InMemoryStorage, StorageOp};
