use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "device-catalog")]
#[command(about = "Discover Indigo device types and contribute them to the device catalog")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base directory (default: ~/.device-catalog)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Indigo connection overrides (defaults come from config)
#[derive(Args, Debug, Clone, Default)]
pub struct IndigoArgs {
    /// Indigo server hostname
    #[arg(long)]
    pub host: Option<String>,

    /// Indigo web server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Use HTTP instead of HTTPS
    #[arg(long)]
    pub no_tls: bool,

    /// API key for authentication
    #[arg(long)]
    pub api_key: Option<String>,

    /// Contributor name for metadata
    #[arg(long)]
    pub contributor: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find device types missing from a local catalog checkout (dry run unless --apply)
    Discover {
        #[command(flatten)]
        indigo: IndigoArgs,

        /// Write new profiles into the catalog and regenerate indexes
        #[arg(long)]
        apply: bool,

        /// Catalog directory (default: catalog.dir from config)
        #[arg(long)]
        catalog_dir: Option<PathBuf>,
    },

    /// Validate catalog files against the profile schema
    Validate {
        /// Catalog directory (default: catalog.dir from config)
        #[arg(long)]
        catalog_dir: Option<PathBuf>,

        /// Schema file (default: <catalog-dir>/../schema/device-profile.schema.json)
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Regenerate _index.json and by-plugin/_index.json from the class files
    Reindex {
        /// Catalog directory (default: catalog.dir from config)
        #[arg(long)]
        catalog_dir: Option<PathBuf>,
    },

    /// Discover against the published catalog and write an export file
    Export {
        #[command(flatten)]
        indigo: IndigoArgs,

        /// Output file (default: export.path from config, else the Desktop)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Discover against the published catalog and open a pull request
    Submit {
        #[command(flatten)]
        indigo: IndigoArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., indigo.host)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., indigo.host)
        key: String,

        /// Value to set (empty string clears optional keys)
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Create config file with defaults
    Init,
}
