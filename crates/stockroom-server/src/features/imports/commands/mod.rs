pub mod cancel;
pub mod delete;
pub mod upload;

pub use cancel::{CancelImportCommand, CancelImportError};
pub use delete::{DeleteImportCommand, DeleteImportError};
pub use upload::{UploadImportCommand, UploadImportError, UploadedFile};
