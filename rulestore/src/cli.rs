//! CLI command implementations.
//!
//! Each command opens the store under `root`, runs one repository operation
//! and, if that operation mutated anything, writes the repository back.
//! Read-only commands hold the store lock shared; mutating commands hold it
//! exclusively from load through save.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info, instrument};

use rulestore::core::format::{AssetFormat, split_file_name};
use rulestore::core::types::AsOf;
use rulestore::io::compiler::CommandCompiler;
use rulestore::io::config::{StoreConfig, load_config};
use rulestore::io::init::{InitOptions, StorePaths, init_store};
use rulestore::io::lock::StoreLock;
use rulestore::io::store::{load_repository, write_repository};
use rulestore::{Asset, Package, Repository};

struct Store {
    paths: StorePaths,
    config: StoreConfig,
    repo: Repository,
    _lock: StoreLock,
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
}

impl Store {
    fn open(root: &Path) -> Result<Self> {
        Self::open_with(root, Access::Read)
    }

    #[instrument(skip_all, fields(root = %root.display(), ?access))]
    fn open_with(root: &Path, access: Access) -> Result<Self> {
        let paths = StorePaths::new(root);
        if !paths.repository_path.is_file() {
            bail!(
                "no store at {} (run `rulestore init`)",
                paths.store_dir.display()
            );
        }
        let lock = match access {
            Access::Read => StoreLock::shared(&paths.lock_path)?,
            Access::Write => StoreLock::exclusive(&paths.lock_path)?,
        };
        let config = load_config(&paths.config_path)?;
        let repo = load_repository(&paths.repository_path)?;
        debug!("store opened");
        Ok(Self {
            paths,
            config,
            repo,
            _lock: lock,
        })
    }

    fn save(&self) -> Result<()> {
        write_repository(&self.paths.repository_path, &self.repo)
    }

    fn author(&self, author: Option<String>) -> String {
        author.unwrap_or_else(|| self.config.default_author.clone())
    }

    fn asset(&self, package: &str, asset: &str) -> Result<std::sync::Arc<Asset>> {
        Ok(self.repo.get_package(package)?.asset(asset)?)
    }
}

/// Run `f` against the store opened for writing, then persist it before the
/// lock is released.
fn mutate<T>(root: &Path, f: impl FnOnce(&Store) -> Result<T>) -> Result<T> {
    let store = Store::open_with(root, Access::Write)?;
    let value = f(&store)?;
    store.save()?;
    Ok(value)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serialize json")?);
    Ok(())
}

fn write_bytes(bytes: &[u8], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, bytes).with_context(|| format!("write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("write stdout")?;
            stdout.flush().context("flush stdout")
        }
    }
}

pub fn init(root: &Path, force: bool) -> Result<()> {
    let paths = init_store(root, &InitOptions { force })?;
    println!("initialized {}", paths.store_dir.display());
    Ok(())
}

pub fn list_packages(root: &Path, archived: bool) -> Result<()> {
    let store = Store::open(root)?;
    let packages = if archived {
        store.repo.list_archived_packages()
    } else {
        store.repo.list_packages()
    };
    for package in packages {
        println!("{}", package.name());
    }
    Ok(())
}

pub fn create_package(root: &Path, name: &str, description: &str) -> Result<()> {
    let id = mutate(root, |store| Ok(store.repo.create_package(name, description)?.id()))?;
    info!(package = name, %id, "created");
    println!("{id}");
    Ok(())
}

pub fn rename_package(root: &Path, old_name: &str, new_name: &str) -> Result<()> {
    mutate(root, |store| Ok(store.repo.rename_package(old_name, new_name)?))
}

pub fn delete_package(root: &Path, name: &str) -> Result<()> {
    mutate(root, |store| Ok(store.repo.delete_package(name)?))
}

pub fn restore_package(root: &Path, name: &str) -> Result<()> {
    mutate(root, |store| Ok(store.repo.restore_package(name).map(drop)?))
}

pub fn purge_package(root: &Path, name: &str) -> Result<()> {
    let purged = mutate(root, |store| Ok(store.repo.purge_package(name)?))?;
    println!("purged {purged}");
    Ok(())
}

#[derive(Serialize)]
struct PackageView {
    #[serde(flatten)]
    meta: rulestore::core::types::EntityMeta,
    description: String,
    assets: Vec<String>,
}

pub fn show_package(root: &Path, name: &str) -> Result<()> {
    let store = Store::open(root)?;
    let package = store.repo.get_package(name)?;
    print_json(&package_view(&package))
}

fn package_view(package: &Package) -> PackageView {
    PackageView {
        meta: package.meta(),
        description: package.description(),
        assets: package.list_assets().iter().map(|asset| asset.name()).collect(),
    }
}

pub fn package_header(
    root: &Path,
    name: &str,
    set: Option<String>,
    file: Option<&Path>,
) -> Result<()> {
    let header = match (set, file) {
        (Some(header), _) => header,
        (None, Some(path)) => {
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
        }
        (None, None) => {
            let store = Store::open(root)?;
            print!("{}", store.repo.get_package(name)?.header());
            return Ok(());
        }
    };
    mutate(root, |store| Ok(store.repo.get_package(name)?.update_header(&header)?))
}

pub fn package_description(root: &Path, name: &str, description: &str) -> Result<()> {
    mutate(root, |store| {
        Ok(store.repo.get_package(name)?.update_description(description)?)
    })
}

pub fn checkin_package(
    root: &Path,
    name: &str,
    message: &str,
    author: Option<String>,
) -> Result<()> {
    let version = mutate(root, |store| {
        let author = store.author(author);
        Ok(store.repo.checkin_package(name, message, &author)?)
    })?;
    println!("{version}");
    Ok(())
}

pub fn package_versions(root: &Path, name: &str) -> Result<()> {
    let store = Store::open(root)?;
    print_json(&store.repo.get_package(name)?.list_versions())
}

pub fn package_tree(root: &Path, name: &str, as_of: AsOf) -> Result<()> {
    let store = Store::open(root)?;
    print_json(&store.repo.get_package(name)?.snapshot(as_of)?)
}

pub fn package_source(root: &Path, name: &str, as_of: AsOf) -> Result<()> {
    let store = Store::open(root)?;
    let source = store.repo.get_package(name)?.assemble_source(as_of)?;
    print!("{source}");
    Ok(())
}

pub fn package_binary(root: &Path, name: &str, as_of: AsOf, output: Option<&Path>) -> Result<()> {
    let store = Store::open(root)?;
    let Some(compiler) = CommandCompiler::from_config(&store.config.compiler) else {
        bail!(
            "no compiler configured (set compiler.command in {})",
            store.paths.config_path.display()
        );
    };
    let artifact = store
        .repo
        .get_package(name)?
        .build_binary(as_of, &compiler)?;
    write_bytes(&artifact, output)
}

pub fn list_assets(root: &Path, package: &str, archived: bool) -> Result<()> {
    let store = Store::open(root)?;
    let package = store.repo.get_package(package)?;
    let assets = if archived {
        package.list_archived_assets()
    } else {
        package.list_assets()
    };
    for asset in assets {
        println!(
            "{}\t{}\t{}",
            asset.name(),
            asset.format(),
            asset.latest_version()
        );
    }
    Ok(())
}

pub fn add_asset(
    root: &Path,
    package: &str,
    file: &Path,
    name: Option<&str>,
    format: Option<&str>,
) -> Result<()> {
    let content = fs::read(file).with_context(|| format!("read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("file name of {}", file.display()))?;
    let id = mutate(root, |store| {
        let package = store.repo.get_package(package)?;
        let asset = match (name, format) {
            (None, None) => package.add_asset_from_file(file_name, content)?,
            (name, format) => {
                let format = match format {
                    Some(tag) => AssetFormat::parse(tag)?,
                    None => split_file_name(file_name)?.1,
                };
                let name = match name {
                    Some(name) => name.to_string(),
                    None => split_file_name(file_name)?.0,
                };
                package.add_asset(&name, format, content)?
            }
        };
        Ok(asset.id())
    })?;
    println!("{id}");
    Ok(())
}

pub fn put_asset(
    root: &Path,
    package: &str,
    asset: &str,
    file: &Path,
    format: Option<&str>,
) -> Result<()> {
    let content = fs::read(file).with_context(|| format!("read {}", file.display()))?;
    mutate(root, |store| {
        let asset = store.asset(package, asset)?;
        match format {
            Some(tag) => asset.update_content(content, AssetFormat::parse(tag)?)?,
            None => asset.update_bytes(content)?,
        }
        Ok(())
    })
}

pub fn get_asset(
    root: &Path,
    package: &str,
    asset: &str,
    as_of: AsOf,
    binary: bool,
    output: Option<&Path>,
) -> Result<()> {
    let store = Store::open(root)?;
    let asset = store.asset(package, asset)?;
    if binary {
        return write_bytes(&asset.binary(as_of)?, output);
    }
    let text = asset.source_text(as_of)?;
    write_bytes(text.as_bytes(), output)
}

pub fn checkin_asset(
    root: &Path,
    package: &str,
    asset: &str,
    message: &str,
    author: Option<String>,
) -> Result<()> {
    let version = mutate(root, |store| {
        let author = store.author(author);
        Ok(store.repo.checkin_asset(package, asset, message, &author)?)
    })?;
    println!("{version}");
    Ok(())
}

pub fn asset_versions(root: &Path, package: &str, asset: &str) -> Result<()> {
    let store = Store::open(root)?;
    print_json(&store.asset(package, asset)?.list_versions())
}

#[derive(Serialize)]
struct AssetView {
    #[serde(flatten)]
    meta: rulestore::core::types::EntityMeta,
    format: AssetFormat,
    state: String,
}

pub fn show_asset(root: &Path, package: &str, asset: &str) -> Result<()> {
    let store = Store::open(root)?;
    let asset = store.asset(package, asset)?;
    print_json(&AssetView {
        meta: asset.meta(),
        format: asset.format(),
        state: asset.lifecycle_state(),
    })
}

pub fn remove_asset(root: &Path, package: &str, asset: &str) -> Result<()> {
    mutate(root, |store| Ok(store.repo.get_package(package)?.remove_asset(asset)?))
}

pub fn rename_asset(root: &Path, package: &str, old_name: &str, new_name: &str) -> Result<()> {
    mutate(root, |store| {
        Ok(store.repo.get_package(package)?.rename_asset(old_name, new_name)?)
    })
}

pub fn purge_asset(root: &Path, package: &str, asset: &str) -> Result<()> {
    let purged = mutate(root, |store| Ok(store.repo.get_package(package)?.purge_asset(asset)?))?;
    println!("purged {purged}");
    Ok(())
}

pub fn asset_state(root: &Path, package: &str, asset: &str, label: Option<&str>) -> Result<()> {
    let Some(label) = label else {
        let store = Store::open(root)?;
        println!("{}", store.asset(package, asset)?.lifecycle_state());
        return Ok(());
    };
    mutate(root, |store| Ok(store.asset(package, asset)?.set_state(label)?))
}
