//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("hub.default_restore_budget_ms", 200)?
        .set_default("hub.null_snapshot", "fail")?
        .set_default("hub.report_slow_restores", true)
}
