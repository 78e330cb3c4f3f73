//! Standalone driver
//!
//! Reads serialized package descriptions (JSON, as produced by a frontend)
//! in dependency order, runs the analysis on each, prints diagnostics as
//! text or JSON, and exits non-zero when any diagnostic remains.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Deserialize;

use nilscan_core::pipeline::{FactStore, MemoryFactStore, Pass};
use nilscan_core::shared::models::{NilscanError, Package};
use nilscan_core::{run_package, AnalyzerConfig, Preset};
use nilscan_facts::{InferredFact, NolintFact};

#[derive(Parser)]
#[command(name = "nilscan", about = "Whole-program nil-safety analyzer")]
struct Cli {
    /// Package description files (JSON), in dependency order
    inputs: Vec<PathBuf>,

    /// Directory for fact exchange across driver invocations
    #[arg(long)]
    facts_dir: Option<PathBuf>,

    /// Emit diagnostics as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Render full file paths in positions
    #[arg(long)]
    full_path: bool,

    /// Group diagnostics that share a nil path
    #[arg(long)]
    group: bool,

    /// Per-function backprop timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
}

/// One package description as emitted by the frontend.
#[derive(Deserialize)]
struct PackageInput {
    package: Package,
    #[serde(default)]
    deps: Vec<String>,
}

/// Facts as files under a directory, one per (package, fact type).
struct DirFactStore {
    dir: PathBuf,
}

impl DirFactStore {
    fn new(dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, pkg: &str, kind: &str) -> PathBuf {
        let sanitized = pkg.replace(['/', '\\'], "_");
        self.dir.join(format!("{}.{}.fact", sanitized, kind))
    }

    fn read(&self, path: &Path) -> nilscan_core::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NilscanError::facts(format!(
                "reading fact file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl FactStore for DirFactStore {
    fn load_inferred(&self, pkg: &str) -> nilscan_core::Result<Option<InferredFact>> {
        match self.read(&self.path(pkg, "inferred"))? {
            Some(bytes) => Ok(Some(nilscan_facts::decode_inferred(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_nolint(&self, pkg: &str) -> nilscan_core::Result<Option<NolintFact>> {
        match self.read(&self.path(pkg, "nolint"))? {
            Some(bytes) => Ok(Some(nilscan_facts::decode_nolint(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store_inferred(&self, fact: &InferredFact) -> nilscan_core::Result<()> {
        let bytes = nilscan_facts::encode_inferred(fact)?;
        fs::write(self.path(&fact.pkg, "inferred"), bytes)
            .map_err(|e| NilscanError::facts(format!("writing inferred fact: {}", e)))
    }

    fn store_nolint(&self, fact: &NolintFact) -> nilscan_core::Result<()> {
        let bytes = nilscan_facts::encode_nolint(fact)?;
        fs::write(self.path(&fact.pkg, "nolint"), bytes)
            .map_err(|e| NilscanError::facts(format!("writing nolint fact: {}", e)))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = AnalyzerConfig::preset(Preset::Default)
        .with_grouping(cli.group)
        .with_backprop_timeout_ms(cli.timeout_ms);
    let config = AnalyzerConfig {
        print_full_path: cli.full_path,
        ..config
    };
    if let Err(e) = config.validate() {
        eprintln!("nilscan: invalid configuration: {}", e);
        return ExitCode::from(2);
    }

    let memory_store;
    let dir_store;
    let store: &dyn FactStore = match &cli.facts_dir {
        Some(dir) => match DirFactStore::new(dir.clone()) {
            Ok(s) => {
                dir_store = s;
                &dir_store
            }
            Err(e) => {
                eprintln!("nilscan: cannot use facts dir {}: {}", dir.display(), e);
                return ExitCode::from(2);
            }
        },
        None => {
            memory_store = MemoryFactStore::new();
            &memory_store
        }
    };

    let mut total_diags = 0usize;
    for input in &cli.inputs {
        let raw = match fs::read_to_string(input) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("nilscan: cannot read {}: {}", input.display(), e);
                return ExitCode::from(2);
            }
        };
        let parsed: PackageInput = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("nilscan: cannot parse {}: {}", input.display(), e);
                return ExitCode::from(2);
            }
        };

        let pass = Pass::new(&parsed.package, &config, parsed.deps, store);
        let result = run_package(&pass);
        total_diags += result.diagnostics.len();

        if cli.json {
            match serde_json::to_string_pretty(&result.diagnostics) {
                Ok(s) => println!("{}", s),
                Err(e) => eprintln!("nilscan: cannot serialize diagnostics: {}", e),
            }
        } else {
            for d in &result.diagnostics {
                let pos = d
                    .pos
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "<no pos info>".to_string());
                println!("{}: {}", pos, d.message);
            }
        }
        for e in &result.errors {
            eprintln!("nilscan: {}: {}", parsed.package.path, e);
        }
    }

    if total_diags > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
