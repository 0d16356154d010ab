mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::exit_code_for;
use setkit_backend::{select_backend, BackendConfig, SettingsBackend};
use setkit_core::SettingsError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "setkit",
    version,
    about = "Inspect, edit and watch typed settings schemas"
)]
struct Cli {
    /// Settings backend: auto, memory or gio (overrides the config file).
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Path to a config file instead of $XDG_CONFIG_HOME/setkit/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the schemas the backend knows about.
    ListSchemas,
    /// List the keys of a schema with their types.
    ListKeys {
        /// Schema identifier, e.g. org.gnome.system.locale.
        schema: String,
    },
    /// Print the value of a key.
    Get { schema: String, key: String },
    /// Write a key. VALUE uses the same text form `get` prints.
    Set {
        schema: String,
        key: String,
        value: String,
    },
    /// Drop the stored value of a key so it reads as its default.
    Reset { schema: String, key: String },
    /// Print every key and value of one schema, or of all schemas.
    Dump { schema: Option<String> },
    /// Print change notifications until interrupted.
    Monitor {
        schema: String,
        /// Only report changes to this key.
        key: Option<String>,
        /// Stop after this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Stop after this many notifications.
        #[arg(long)]
        count: Option<usize>,
    },
    /// Open the power, keyboard, locale and mouse schemas and repeat a fixed
    /// sequence of reads and writes.
    Exercise {
        #[arg(long, default_value_t = 1)]
        iterations: u32,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn resolve_backend(
    flag: Option<&str>,
    config: Option<&Path>,
) -> Result<Arc<dyn SettingsBackend>, String> {
    let name = if let Some(name) = flag {
        name.to_owned()
    } else {
        let cfg = match config {
            Some(path) => BackendConfig::load(path),
            None => BackendConfig::load_default(),
        }
        .map_err(|e| format!("config error: {e}"))?;
        cfg.backend
    };
    let backend = select_backend(&name).map_err(|e| SettingsError::from(e).to_string())?;
    if !backend.available() {
        return Err(format!(
            "backend unavailable: backend '{name}' cannot be reached"
        ));
    }
    tracing::debug!("using {} backend", backend.name());
    Ok(Arc::from(backend))
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SETKIT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    let needs_backend = !matches!(
        cli.command,
        Commands::Completions { .. } | Commands::ManPages { .. }
    );
    let backend = if needs_backend {
        match resolve_backend(cli.backend.as_deref(), cli.config.as_deref()) {
            Ok(backend) => Some(backend),
            Err(msg) => {
                eprintln!("error: {msg}");
                return ExitCode::from(exit_code_for(&msg));
            }
        }
    } else {
        None
    };

    let result = match (cli.command, backend) {
        (Commands::Completions { shell }, _) => commands::completions::run::<Cli>(shell),
        (Commands::ManPages { dir }, _) => commands::man_pages::run::<Cli>(&dir),
        (_, None) => Err("no backend selected".to_owned()),
        (Commands::ListSchemas, Some(backend)) => {
            commands::list_schemas::run(backend.as_ref(), json)
        }
        (Commands::ListKeys { schema }, Some(backend)) => {
            commands::list_keys::run(backend.as_ref(), &schema, json)
        }
        (Commands::Get { schema, key }, Some(backend)) => {
            commands::get::run(backend.as_ref(), &schema, &key, json)
        }
        (Commands::Set { schema, key, value }, Some(backend)) => {
            commands::set::run(backend.as_ref(), &schema, &key, &value, json)
        }
        (Commands::Reset { schema, key }, Some(backend)) => {
            commands::reset::run(backend.as_ref(), &schema, &key, json)
        }
        (Commands::Dump { schema }, Some(backend)) => {
            commands::dump::run(backend.as_ref(), schema.as_deref(), json)
        }
        (
            Commands::Monitor {
                schema,
                key,
                timeout_ms,
                count,
            },
            Some(backend),
        ) => commands::monitor::run(
            backend,
            &schema,
            key.as_deref(),
            commands::monitor::Limits { timeout_ms, count },
            json,
        ),
        (Commands::Exercise { iterations }, Some(backend)) => {
            commands::exercise::run(backend.as_ref(), iterations, json)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
