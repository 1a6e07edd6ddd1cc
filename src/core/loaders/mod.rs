pub mod context;
pub mod fabric;
pub mod forge;
pub mod forge_profile;
pub mod installer;
pub mod processor;

pub use context::GameContext;
pub use fabric::{FabricBuild, FabricBuildEntry, FabricInstaller};
pub use forge::{ForgeInstallEntry, ForgeInstaller, ForgePackage};
pub use forge_profile::{InstallProfile, Processor, SubstitutionContext, SubstitutionPaths};
pub use installer::{
    InstallProgress, InstallReport, InstallStatus, Installer, InstallerPipeline, ProgressReporter,
};
pub use processor::{ProcessorLog, ProcessorLogs, ProcessorRunner};
