// svforge: provisioning pipeline for Minecraft server installations

pub mod builder;
pub mod catalog;
pub mod constants;
pub mod director;
pub mod error;
pub mod fetch;
pub mod java;
pub mod mc_version;
pub mod model;
pub mod process;
pub mod provision;
pub mod record;
pub mod reporter;

pub use director::{DirectorOptions, InstallationDirector};
pub use error::{InstallError, ProvisionError, ProvisionResult, Step};
pub use model::{BuildSelector, InstallRequest, InstallationResult, ServerType};
pub use reporter::{Reporter, SilentReporter};
