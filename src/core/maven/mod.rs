mod artifact;

pub use artifact::MavenArtifact;

/// Well-known repositories and metadata hosts used by the installers.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const FORGE_FILES_MAVEN: &str = "https://files.minecraftforge.net/maven";
pub const BMCL_MAVEN: &str = "https://bmclapi2.bangbang93.com/maven";
pub const BMCL_FORGE_LIST: &str = "https://bmclapi2.bangbang93.com/forge/minecraft";
pub const FABRIC_META: &str = "https://meta.fabricmc.net/v2";
