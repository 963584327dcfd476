//! Treeline - Build UID-addressed entity trees from spreadsheet outlines

use anyhow::{Context, bail};
use directories::ProjectDirs;
use std::env;
use std::path::{Path, PathBuf};

use treeline_core::storage::{manifest_to_string, read_csv, read_manifest, write_csv, write_manifest};
use treeline_core::{Breakdown, PostingConfig};

fn print_usage() {
    eprintln!("Usage: treeline [OPTIONS] <CSV>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <CSV>                     Table to ingest, header row first");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>       Posting configuration (default: <config dir>/treeline/posting.toml)");
    eprintln!("  -p, --prior <FILE>        Prior JSON manifest to update");
    eprintln!("  -o, --output <FILE>       Write the manifest to a file instead of stdout");
    eprintln!("  -t, --tabular <FILE>      Also write the tree flattened back to CSV");
    eprintln!("  --root <ENTITY>           Override the root entity type");
    eprintln!("  --reuse-uids              Keep UIDs carried by the table");
    eprintln!("  --merge                   Update the prior tree in place");
    eprintln!("  -v, --verbose             Debug logging (RUST_LOG takes precedence)");
    eprintln!("  -h, --help                Print help");
}

#[derive(Debug, Default)]
struct Options {
    table: Option<PathBuf>,
    config: Option<PathBuf>,
    prior: Option<PathBuf>,
    output: Option<PathBuf>,
    tabular: Option<PathBuf>,
    root: Option<String>,
    reuse_uids: bool,
    merge: bool,
    verbose: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            flag @ ("-c" | "--config" | "-p" | "--prior" | "-o" | "--output" | "-t" | "--tabular") => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: {} requires a file path", flag);
                    std::process::exit(1);
                }
                let path = Some(PathBuf::from(&args[i]));
                match flag {
                    "-c" | "--config" => options.config = path,
                    "-p" | "--prior" => options.prior = path,
                    "-o" | "--output" => options.output = path,
                    _ => options.tabular = path,
                }
            }
            "--root" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --root requires an entity type");
                    std::process::exit(1);
                }
                options.root = Some(args[i].to_string());
            }
            "--reuse-uids" => options.reuse_uids = true,
            "--merge" => options.merge = true,
            "-v" | "--verbose" => options.verbose = true,
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(1);
            }
            _ => {
                if options.table.is_none() {
                    options.table = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: Unexpected argument: {}", args[i]);
                    print_usage();
                    std::process::exit(1);
                }
            }
        }
        i += 1;
    }

    init_tracing(options.verbose);

    if let Err(e) = run(options) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(options: Options) -> anyhow::Result<()> {
    let Some(table_path) = options.table else {
        print_usage();
        bail!("missing <CSV> argument");
    };

    let config_path = match options.config {
        Some(path) => path,
        None => user_config_path().context("could not determine the user config directory")?,
    };
    let mut config = PostingConfig::load(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    apply_overrides(&mut config, options.root, options.reuse_uids, options.merge);

    let table = read_csv(&table_path).with_context(|| format!("failed to read {}", table_path.display()))?;
    let prior = options
        .prior
        .as_deref()
        .map(|path| load_prior(path, &config.root_entity))
        .transpose()?;
    if prior.is_none() && config.policy.merge() {
        tracing::warn!("merge has no effect without a prior manifest");
    }

    let build = config
        .orchestrator()
        .build_with_prior(&table, prior)
        .with_context(|| format!("failed to build tree from {}", table_path.display()))?;

    let manifest = build.as_dicts();
    match options.output {
        Some(path) => {
            write_manifest(&path, &manifest).with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {} entities to {}", build.tree().len(), path.display());
        }
        None => println!("{}", manifest_to_string(&manifest)?),
    }

    if let Some(path) = options.tabular {
        let flat = build.tree().to_table()?;
        write_csv(&path, &flat).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

fn apply_overrides(config: &mut PostingConfig, root: Option<String>, reuse_uids: bool, merge: bool) {
    if let Some(root) = root {
        config.root_entity = root;
    }
    if reuse_uids {
        config.policy = config.policy.with_reuse_uids(true);
    }
    if merge {
        config.policy = config.policy.with_merge(true);
    }
}

fn load_prior(path: &Path, root_entity: &str) -> anyhow::Result<Breakdown> {
    let manifest = read_manifest(path).with_context(|| format!("failed to read prior {}", path.display()))?;
    Ok(Breakdown::from_manifest(root_entity, &manifest)?)
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "treeline")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("posting.toml");
    Some(path)
}
