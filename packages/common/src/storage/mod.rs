mod error;
mod key;
mod signing;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use key::ObjectKey;
pub use signing::UrlSigner;
pub use traits::{BoxReader, ObjectStore};
