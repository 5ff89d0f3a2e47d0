use clap::{Parser, Subcommand, ValueEnum};
use cookie_core::config::ConfigOverrides;
use cookie_core::ledger::DeletePolicy;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new to-do item worth some points
    ///
    /// Example: cookie_jar add "Wash dishes" 10
    Add {
        title: Option<String>,
        #[arg(allow_negative_numbers = true)]
        points: Option<i64>,
    },
    /// Show active and completed items with the current balance
    ///
    /// Example: cookie_jar list
    List,
    /// Complete an active item or reopen a completed one
    ///
    /// Example: cookie_jar toggle active 0
    Toggle {
        section: String,
        #[arg(allow_negative_numbers = true)]
        row: i64,
    },
    /// Delete an item
    ///
    /// Example: cookie_jar delete completed 2
    Delete {
        section: String,
        #[arg(allow_negative_numbers = true)]
        row: i64,
    },
    /// Move an item to another position in the same section
    ///
    /// Example: cookie_jar move active 0 2
    Move {
        section: String,
        #[arg(allow_negative_numbers = true)]
        from: i64,
        #[arg(allow_negative_numbers = true)]
        to: i64,
    },
    /// Show the points balance
    ///
    /// Example: cookie_jar points
    Points,
    /// List cookies for sale
    ///
    /// Example: cookie_jar shop
    Shop,
    /// Spend points on a cookie
    ///
    /// Example: cookie_jar buy "Chocolate Chip"
    Buy {
        name: String,
    },
    /// List purchased cookies
    ///
    /// Example: cookie_jar cookies
    Cookies,
    /// Reset stored data
    ///
    /// Example: cookie_jar reset points
    /// Example: cookie_jar reset all
    Reset {
        #[arg(value_enum)]
        target: ResetTarget,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResetTarget {
    Tasks,
    Points,
    Cookies,
    All,
}

/// Flag name used to identify config override arguments by the runtime.
pub const CONFIG_OVERRIDE_FLAG: &str = "--config-override";

/// One validated `KEY=VALUE` override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOverride {
    DeletePolicy(DeletePolicy),
}

/// Parse a raw `KEY=VALUE` override string into a structured override.
pub fn parse_config_override(raw: &str) -> Result<ConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim();
    let canonical_field = canonicalize_flag_name(key_raw)
        .ok_or_else(|| "override key cannot be empty".to_string())?;

    match canonical_field.as_str() {
        "delete_policy" => DeletePolicy::parse(value)
            .map(ConfigOverride::DeletePolicy)
            .ok_or_else(|| format!("unknown delete policy '{value}'")),
        other => Err(format!("unknown config field '{other}'")),
    }
}

/// Folds every raw override into one [`ConfigOverrides`]; later values win.
pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        match parse_config_override(entry)? {
            ConfigOverride::DeletePolicy(policy) => overrides.delete_policy = Some(policy),
        }
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
