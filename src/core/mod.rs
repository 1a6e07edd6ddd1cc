// ─── Loader Installer Core ───
// Installs Fabric and Forge into an existing game folder.
//
// Architecture:
//   core/
//     maven/       Coordinate parsing + repository layout
//     version/     Library entries, OS rules, version descriptor
//     downloader/  Fetcher seam + bounded concurrent batches
//     loaders/     Fabric, Forge, install profile, processors
//     config.rs    Downloader and installer settings

pub mod cancel;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod loaders;
pub mod maven;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
