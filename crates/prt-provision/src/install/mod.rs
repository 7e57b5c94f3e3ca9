pub mod classify;
pub mod copy;
pub mod runtime;
pub mod unzip;

pub use classify::{classify, prune_unused, PackageTree};
pub use copy::{copy_file, copy_tree, ensure_tree_unlocked, CopyOutcome, CopyPolicy, CopyStats};
pub use runtime::{ProvisionReport, Provisioner};
pub use unzip::{extract, unzip_into};
