//! Flat-directory image storage.
//!
//! Every uploaded image lives directly under a single storage root with a
//! generated name of the form `<field>-<unix-millis>-<random><ext>`. Names
//! coming from clients are validated before they touch the filesystem, and
//! read-modify-write cycles on a file are serialized through [`FileLocks`].

mod locks;
mod store;

pub use locks::{FileLockGuard, FileLocks};
pub use store::{
    content_type_for, generate_filename, ImageStore, PendingUpload, StoredImage,
    PUBLIC_PATH_PREFIX,
};
