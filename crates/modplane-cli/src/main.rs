//! Modplane - module lifecycle tooling
//!
//! The `modplane` command runs the lifecycle operations offline over JSON
//! files exported from the management plane.
//!
//! ## Commands
//!
//! - `reconcile`: Upgrade a module instance to a new module definition
//! - `consistency`: Check dependencies at policy, group or agent scope
//! - `detach`: Remove references to a module from the other instances
//! - `changes`: Show which protected fields an update touches
//! - `encrypt` / `decrypt`: Convert a secure parameter set
//!
//! The encryption key is read from the environment variable named by
//! `--key-env` (hex, 32 bytes).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use modplane_core::{
    agent_consistency, compare_changes, detach_module, group_consistency, policy_consistency,
    Agent, ConsistencyReport, ModuleDefinition, ModuleInstance, Reconciler, SecureConfig,
    SecureParamCrypto, METRICS,
};
use modplane_crypto::{CryptoConfig, DbConfigEncryptor, DEFAULT_KEY_ENV};
use schema_merge::SchemaGuidedMerge;

#[derive(Parser)]
#[command(name = "modplane")]
#[command(author = "Modplane Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Module lifecycle reconciliation and dependency checks", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Environment variable holding the hex-encoded encryption key
    #[arg(long, global = true, default_value = DEFAULT_KEY_ENV)]
    key_env: String,

    /// Ciphertext prefix (defaults to MODPLANE_DB_ENCRYPT_PREFIX or "enc")
    #[arg(long, global = true)]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade a module instance to a module definition
    Reconcile {
        /// Stored module instance (JSON)
        #[arg(short, long)]
        instance: PathBuf,

        /// Target module definition (JSON)
        #[arg(short, long)]
        definition: PathBuf,

        /// Output path for the reconciled instance (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave secure parameters decrypted in the output
        #[arg(long)]
        plaintext: bool,

        /// Print the per-config outcome summary to stderr
        #[arg(long)]
        summary: bool,
    },

    /// Check module dependency consistency
    Consistency {
        #[command(subcommand)]
        scope: ConsistencyScope,
    },

    /// Remove every reference to a module from the remaining instances
    Detach {
        /// Module instances of the policy (JSON array)
        #[arg(short, long)]
        modules: PathBuf,

        /// Name of the module being removed
        #[arg(short, long)]
        name: String,

        /// Output path for the updated instances (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare an incoming instance update against the stored instance
    Changes {
        #[arg(long)]
        incoming: PathBuf,

        #[arg(long)]
        stored: PathBuf,
    },

    /// Encrypt a secure parameter set
    Encrypt {
        /// Secure parameter set (JSON object)
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt a secure parameter set
    Decrypt {
        /// Secure parameter set (JSON object)
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConsistencyScope {
    /// Modules attached to one policy
    Policy {
        /// Module instances (JSON array)
        #[arg(short, long)]
        modules: PathBuf,

        /// Exit with an error when inconsistent
        #[arg(long)]
        strict: bool,
    },
    /// Modules of every policy in a group
    Group {
        #[arg(short, long)]
        modules: PathBuf,

        #[arg(long)]
        strict: bool,
    },
    /// Modules applied to an agent, plus the agent's own version
    Agent {
        #[arg(short, long)]
        modules: PathBuf,

        /// Agent record (JSON)
        #[arg(short, long)]
        agent: PathBuf,

        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    modplane_core::telemetry::init_tracing(cli.json, level);

    let crypto_config = crypto_config(&cli.key_env, cli.prefix.as_deref());

    let result = match cli.command {
        Commands::Reconcile {
            instance,
            definition,
            output,
            plaintext,
            summary,
        } => cmd_reconcile(
            &crypto_config,
            &instance,
            &definition,
            output.as_deref(),
            plaintext,
            summary,
        ),
        Commands::Consistency { scope } => cmd_consistency(scope),
        Commands::Detach {
            modules,
            name,
            output,
        } => cmd_detach(&modules, &name, output.as_deref()),
        Commands::Changes { incoming, stored } => {
            cmd_changes(&crypto_config, &incoming, &stored)
        }
        Commands::Encrypt { input, output } => {
            cmd_convert_secure(&crypto_config, &input, output.as_deref(), true)
        }
        Commands::Decrypt { input, output } => {
            cmd_convert_secure(&crypto_config, &input, output.as_deref(), false)
        }
    };

    METRICS.flush();
    result
}

fn crypto_config(key_env: &str, prefix: Option<&str>) -> CryptoConfig {
    let config = CryptoConfig::from_env().with_key_env(key_env);
    match prefix {
        Some(prefix) => config.with_prefix(prefix),
        None => config,
    }
}

fn build_encryptor(config: &CryptoConfig) -> Result<DbConfigEncryptor> {
    config
        .build()
        .with_context(|| format!("failed to configure encryption from {}", config.key_env))
}

fn cmd_reconcile(
    config: &CryptoConfig,
    instance_path: &Path,
    definition_path: &Path,
    output: Option<&Path>,
    plaintext: bool,
    summary: bool,
) -> Result<()> {
    let instance: ModuleInstance = read_json_file(instance_path)?;
    let definition: ModuleDefinition = read_json_file(definition_path)?;
    let encryptor = build_encryptor(config)?;
    let crypto = SecureParamCrypto::new(&encryptor);

    let reconciler = Reconciler::new(Box::new(SchemaGuidedMerge::new()));
    let (mut next, outcome) = reconciler
        .reconcile_with_summary(&instance, &definition, &crypto)
        .with_context(|| format!("failed to reconcile module {}", instance.name()))?;

    if !plaintext {
        next.encrypt_secure_parameters(&crypto)
            .context("failed to re-encrypt secure parameters")?;
    }
    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    info!(
        module = %next.name(),
        version = %next.info.version,
        fallbacks = outcome.fallbacks().len(),
        "module instance reconciled"
    );
    write_json(output, &next)
}

fn cmd_consistency(scope: ConsistencyScope) -> Result<()> {
    let (report, strict) = match scope {
        ConsistencyScope::Policy { modules, strict } => {
            let modules: Vec<ModuleInstance> = read_json_file(&modules)?;
            (policy_consistency(&modules), strict)
        }
        ConsistencyScope::Group { modules, strict } => {
            let modules: Vec<ModuleInstance> = read_json_file(&modules)?;
            (group_consistency(&modules), strict)
        }
        ConsistencyScope::Agent {
            modules,
            agent,
            strict,
        } => {
            let modules: Vec<ModuleInstance> = read_json_file(&modules)?;
            let agent: Agent = read_json_file(&agent)?;
            (agent_consistency(&modules, &agent), strict)
        }
    };
    write_json(None, &report)?;
    check_strict(&report, strict)
}

fn check_strict(report: &ConsistencyReport, strict: bool) -> Result<()> {
    if strict && !report.consistent {
        let failed: Vec<String> = report
            .unsatisfied()
            .map(|v| {
                format!(
                    "{} -> {} ({})",
                    v.source_module_name,
                    v.dependency.module_name,
                    v.dependency.dep_type
                )
            })
            .collect();
        bail!("inconsistent dependencies: {}", failed.join(", "));
    }
    Ok(())
}

fn cmd_detach(modules_path: &Path, name: &str, output: Option<&Path>) -> Result<()> {
    let mut modules: Vec<ModuleInstance> = read_json_file(modules_path)?;
    let changed = detach_module(&mut modules, name);
    info!(module = %name, changed, "module references removed");
    write_json(output, &modules)
}

fn cmd_changes(config: &CryptoConfig, incoming: &Path, stored: &Path) -> Result<()> {
    let incoming: ModuleInstance = read_json_file(incoming)?;
    let stored: ModuleInstance = read_json_file(stored)?;
    let encryptor = build_encryptor(config)?;
    let changes = compare_changes(&incoming, &stored, &SecureParamCrypto::new(&encryptor))
        .context("failed to compare module instances")?;
    write_json(None, &changes)?;
    if changes.immutable_changed() {
        bail!("update changes fields that cannot be edited");
    }
    Ok(())
}

fn cmd_convert_secure(
    config: &CryptoConfig,
    input: &Path,
    output: Option<&Path>,
    encrypt: bool,
) -> Result<()> {
    let mut set: SecureConfig = read_json_file(input)?;
    let encryptor = build_encryptor(config)?;
    convert_secure(&SecureParamCrypto::new(&encryptor), &mut set, encrypt)?;
    write_json(output, &set)
}

/// Move a set into the requested state; a set already there is left as is.
fn convert_secure(crypto: &SecureParamCrypto<'_>, set: &mut SecureConfig, encrypt: bool) -> Result<()> {
    if encrypt {
        crypto.encrypt_if_plaintext(set).context("encryption failed")
    } else {
        crypto.decrypt_if_encrypted(set).context("decryption failed")
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn write_json<T: Serialize>(output: Option<&Path>, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, rendered + "\n")
            .with_context(|| format!("Failed to write {:?}", path)),
        None => {
            println!("{}", rendered);
            Ok(())
        }
    }
}
