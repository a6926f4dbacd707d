//! Versioned rule package store.
//!
//! Keeps packages, assets and their version histories in
//! `.rulestore/repository.json` under the current directory.

mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rulestore::error::RepoError;
use rulestore::{exit_codes, logging};

#[derive(Parser, Debug)]
#[command(name = "rulestore", version, about = "Versioned rule package store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create `.rulestore/` with a default config and an empty repository.
    Init {
        /// Reset config.toml to defaults. The repository is never overwritten.
        #[arg(short, long)]
        force: bool,
    },
    /// Package operations.
    #[command(subcommand)]
    Package(PackageCommand),
    /// Asset operations.
    #[command(subcommand)]
    Asset(AssetCommand),
}

#[derive(Subcommand, Debug)]
enum PackageCommand {
    /// List packages by name.
    List {
        /// List archived packages instead of live ones.
        #[arg(long)]
        archived: bool,
    },
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    Rename {
        old_name: String,
        new_name: String,
    },
    /// Archive a package. Its history is kept.
    Delete { name: String },
    /// Bring back an archived package.
    Restore { name: String },
    /// Permanently remove a package and its history.
    Purge { name: String },
    /// Print package metadata as JSON.
    Show { name: String },
    /// Print the working header, or replace it with --set/--file.
    Header {
        name: String,
        #[arg(long, conflicts_with = "file")]
        set: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Description { name: String, description: String },
    /// Record a package version pinning the latest version of each asset.
    Checkin {
        name: String,
        #[command(flatten)]
        checkin: CheckinArgs,
    },
    /// List package versions as JSON.
    Versions { name: String },
    /// Print the header and pinned asset versions as JSON.
    Tree {
        name: String,
        #[arg(long)]
        version: Option<u64>,
    },
    /// Print the assembled package source.
    Source {
        name: String,
        #[arg(long)]
        version: Option<u64>,
    },
    /// Compile the assembled source with the configured compiler.
    Binary {
        name: String,
        #[arg(long)]
        version: Option<u64>,
        /// Write the artifact here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum AssetCommand {
    /// List assets of a package as `name<TAB>format<TAB>version`.
    List {
        package: String,
        #[arg(long)]
        archived: bool,
    },
    /// Add an asset from a file. Name and format come from the file name
    /// unless given.
    Add {
        package: String,
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        format: Option<String>,
    },
    /// Replace an asset's working content.
    Put {
        package: String,
        asset: String,
        file: PathBuf,
        #[arg(long)]
        format: Option<String>,
    },
    /// Print asset content (working copy or a version).
    Get {
        package: String,
        asset: String,
        #[arg(long)]
        version: Option<u64>,
        /// Emit raw bytes instead of text.
        #[arg(long)]
        binary: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Checkin {
        package: String,
        asset: String,
        #[command(flatten)]
        checkin: CheckinArgs,
    },
    Versions { package: String, asset: String },
    /// Print asset metadata as JSON.
    Show { package: String, asset: String },
    /// Archive an asset. Older package versions still resolve it.
    Remove { package: String, asset: String },
    Rename {
        package: String,
        old_name: String,
        new_name: String,
    },
    /// Permanently remove an asset and its history.
    Purge { package: String, asset: String },
    /// Print the lifecycle state, or set it.
    State {
        package: String,
        asset: String,
        label: Option<String>,
    },
}

#[derive(Args, Debug)]
struct CheckinArgs {
    #[arg(short, long)]
    message: String,
    /// Defaults to `default_author` from config.toml.
    #[arg(long)]
    author: Option<String>,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = std::env::current_dir()?;
    match cli.command {
        Command::Init { force } => cli::init(&root, force),
        Command::Package(command) => run_package(&root, command),
        Command::Asset(command) => run_asset(&root, command),
    }
}

fn run_package(root: &std::path::Path, command: PackageCommand) -> Result<()> {
    use PackageCommand as P;
    match command {
        P::List { archived } => cli::list_packages(root, archived),
        P::Create { name, description } => cli::create_package(root, &name, &description),
        P::Rename { old_name, new_name } => cli::rename_package(root, &old_name, &new_name),
        P::Delete { name } => cli::delete_package(root, &name),
        P::Restore { name } => cli::restore_package(root, &name),
        P::Purge { name } => cli::purge_package(root, &name),
        P::Show { name } => cli::show_package(root, &name),
        P::Header { name, set, file } => cli::package_header(root, &name, set, file.as_deref()),
        P::Description { name, description } => {
            cli::package_description(root, &name, &description)
        }
        P::Checkin { name, checkin } => {
            cli::checkin_package(root, &name, &checkin.message, checkin.author)
        }
        P::Versions { name } => cli::package_versions(root, &name),
        P::Tree { name, version } => cli::package_tree(root, &name, version.into()),
        P::Source { name, version } => cli::package_source(root, &name, version.into()),
        P::Binary {
            name,
            version,
            output,
        } => cli::package_binary(root, &name, version.into(), output.as_deref()),
    }
}

fn run_asset(root: &std::path::Path, command: AssetCommand) -> Result<()> {
    use AssetCommand as A;
    match command {
        A::List { package, archived } => cli::list_assets(root, &package, archived),
        A::Add {
            package,
            file,
            name,
            format,
        } => cli::add_asset(root, &package, &file, name.as_deref(), format.as_deref()),
        A::Put {
            package,
            asset,
            file,
            format,
        } => cli::put_asset(root, &package, &asset, &file, format.as_deref()),
        A::Get {
            package,
            asset,
            version,
            binary,
            output,
        } => cli::get_asset(
            root,
            &package,
            &asset,
            version.into(),
            binary,
            output.as_deref(),
        ),
        A::Checkin {
            package,
            asset,
            checkin,
        } => cli::checkin_asset(root, &package, &asset, &checkin.message, checkin.author),
        A::Versions { package, asset } => cli::asset_versions(root, &package, &asset),
        A::Show { package, asset } => cli::show_asset(root, &package, &asset),
        A::Remove { package, asset } => cli::remove_asset(root, &package, &asset),
        A::Rename {
            package,
            old_name,
            new_name,
        } => cli::rename_asset(root, &package, &old_name, &new_name),
        A::Purge { package, asset } => cli::purge_asset(root, &package, &asset),
        A::State {
            package,
            asset,
            label,
        } => cli::asset_state(root, &package, &asset, label.as_deref()),
    }
}

/// Map a failure onto a stable exit code. Errors that did not originate in
/// the repository core are reported as `INVALID`.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<RepoError>()
        .map_or(exit_codes::INVALID, |repo_err| {
            exit_codes::for_kind(repo_err.kind())
        })
}
