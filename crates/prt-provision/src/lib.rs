//! prt-provision
//!
//! Blocking I/O pipeline that makes a prebuilt PRT SDK package available to a
//! native build.
//! - Probes the installed core runtime's embedded version.
//! - Downloads, verifies and unpacks the release archive when it is missing or stale.
//! - Installs core runtime, import libraries, allow-listed extensions and headers.
//! - Reports the dependency set as an [`InstallManifest`].
//!
//! Call from a build script or the `prt-installer` CLI; nothing here is async.

pub mod config;
pub mod errors;
pub mod install;
pub mod manifest;
pub mod net;
pub mod paths;
pub mod platform;
pub mod state;
pub mod types;
pub mod version;

pub use config::{DownloadOptions, ExtensionAllowList, ProvisionConfig};
pub use errors::{ProvisionError, Result};
pub use install::{ProvisionReport, Provisioner};
pub use manifest::{read_manifest, write_manifest, InstallManifest};
pub use net::{archive_url, HttpTransport, Transport};
pub use paths::*;
pub use platform::{PackagePlatform, UnpackStrategy};
pub use state::{ProvisionState, StateTrail};
pub use types::*;
pub use version::ProbeResult;
