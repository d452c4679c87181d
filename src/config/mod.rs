//! Application configuration.
//!
//! Consolidates configuration from four tiers with field-by-field YAML merging:
//! 1. **Defaults** - `Config::default()`
//! 2. **Project** - `$CWD/entity-index/config.yaml`
//! 3. **User** - `~/.entity-index/config.yaml`
//! 4. **Environment** - variables listed below
//!
//! Layout configs (entity definitions) are a separate concern; see
//! [`crate::layout::LayoutConfig`].
//!
//! ## Environment Variables
//! - `ENTITY_INDEX_CONFIG_PATH` - Explicit config file (overrides file tiers)
//! - `ENTITY_INDEX_DB_PATH` - Database path
//! - `ENTITY_INDEX_BATCH_SIZE` - Metadata flush threshold
//! - `ENTITY_INDEX_USER_DIR` - User config dir (default: `~/.entity-index`)
//! - `ENTITY_INDEX_PROJECT_DIR` - Project config dir (default: `./entity-index`)

mod loader;
mod merge;
mod types;

pub use loader::{CONFIG_FILE, ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
