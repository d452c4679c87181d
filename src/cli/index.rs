//! Index subcommand for entity-index CLI

use crate::config::{Config, PathPattern};
use crate::format::OutputFormat;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the index subcommand
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Dataset root directory
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Layout config active at the root (path or builtin name); repeatable
    ///
    /// Replaces `index.layout_configs` from the configuration when given.
    #[arg(long = "layout-config", value_name = "CONFIG")]
    pub layout_configs: Vec<String>,

    /// Bypass validity checks under matching paths; repeatable
    ///
    /// A `re:` prefix makes the pattern a regex searched in the root-relative
    /// path, otherwise it names a path relative to the root.
    #[arg(long = "force-index", value_name = "PATTERN")]
    pub force_index: Vec<String>,

    /// Skip sidecar metadata resolution
    #[arg(long)]
    pub no_metadata: bool,

    /// Also index each pipeline under <ROOT>/derivatives as its own root
    #[arg(long)]
    pub derivatives: bool,

    /// Clear the database before indexing
    #[arg(long)]
    pub reset: bool,

    /// Output format for the run summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl IndexArgs {
    /// Fold the command-line overrides into the merged configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if !self.layout_configs.is_empty() {
            config.index.layout_configs = self.layout_configs.clone();
        }
        config
            .index
            .force_index
            .extend(self.force_index.iter().map(|p| PathPattern::parse(p)));
        if self.no_metadata {
            config.metadata.enabled = false;
        }
        if self.derivatives {
            config.index.derivatives = true;
        }
    }
}
