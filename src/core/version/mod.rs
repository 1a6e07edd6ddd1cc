pub mod descriptor;
pub mod library;

pub use descriptor::VersionDescriptor;
pub use library::{
    libraries_dir, LibDownloadArtifact, LibraryDownloads, LibraryEntry, LibraryResolver,
    LibraryRule, OsRule, RawLibrary, RuleAction, Side,
};
