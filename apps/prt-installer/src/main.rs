use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prt_provision::{PackagePlatform, PackageVersion, ProbeResult, ProvisionConfig, Provisioner};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Installs the PRT SDK package a native build depends on.
#[derive(Debug, Parser)]
#[command(name = "prt-installer")]
struct Cli {
    /// JSON config file; environment (PRT_*) and flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Install root (default: per-user data dir).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Target package platform: win64 or mac.
    #[arg(long, global = true)]
    platform: Option<PackagePlatform>,

    /// Expected package version, e.g. 2.1.5705.
    #[arg(long = "version", global = true, value_name = "VERSION")]
    package_version: Option<PackageVersion>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install the package if needed and print the dependency manifest.
    Provision {
        /// Reinstall even if the installed version matches.
        #[arg(long)]
        force: bool,

        /// Also copy runtime libraries into this directory.
        #[arg(long)]
        staging: Option<PathBuf>,

        /// Write the manifest JSON to this file as well.
        #[arg(long)]
        manifest_out: Option<PathBuf>,
    },
    /// Report whether the installed package matches the expected version.
    Probe,
    /// Print the download URL of the expected package.
    Url,
}

fn load_config(cli: &Cli) -> Result<ProvisionConfig> {
    let mut cfg = match &cli.config {
        Some(path) => ProvisionConfig::load(path)?,
        None => ProvisionConfig::default(),
    };
    cfg.apply_env()?;

    if let Some(root) = &cli.root {
        cfg.install_root = root.clone();
    }
    if let Some(p) = cli.platform {
        cfg.platform = Some(p);
    }
    if let Some(v) = cli.package_version {
        cfg.version = v;
    }
    cfg.verbose |= cli.verbose;

    if let Command::Provision {
        force,
        staging,
        manifest_out,
    } = &cli.command
    {
        cfg.force |= *force;
        if staging.is_some() {
            cfg.staging_dir = staging.clone();
        }
        if manifest_out.is_some() {
            cfg.manifest_file = manifest_out.clone();
        }
    }
    Ok(cfg)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    init_logging(cfg.verbose);

    let expected = cfg.version;
    let provisioner = Provisioner::new(cfg).context("set up provisioning")?;

    match cli.command {
        Command::Provision { .. } => {
            let report = provisioner.provision()?;
            tracing::info!(
                copied = report.copies.copied,
                skipped = report.copies.skipped,
                "done: {}",
                report.trail.current()
            );
            println!("{}", serde_json::to_string_pretty(&report.manifest)?);
        }
        Command::Probe => match provisioner.probe_installed()? {
            ProbeResult::Missing => println!("missing"),
            ProbeResult::Match => println!("match {expected}"),
            ProbeResult::Mismatch(found) => println!("mismatch {found}"),
        },
        Command::Url => println!("{}", provisioner.download_url()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "prt-installer",
            "--root",
            "/tmp/prt",
            "--platform",
            "mac",
            "--version",
            "2.4.7316",
            "provision",
            "--force",
            "--staging",
            "/tmp/host/Binaries",
        ]);
        let cfg = load_config(&cli).unwrap();
        assert_eq!(cfg.install_root, PathBuf::from("/tmp/prt"));
        assert_eq!(cfg.platform, Some(PackagePlatform::MacX64));
        assert_eq!(cfg.version, PackageVersion::new(2, 4, 7316));
        assert!(cfg.force);
        assert_eq!(cfg.staging_dir, Some(PathBuf::from("/tmp/host/Binaries")));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
