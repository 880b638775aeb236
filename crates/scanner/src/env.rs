use anyhow::{anyhow, Context as _, Result};
use std::fs;

/// Loads development settings from `.env.toml` in the crate directory.
///
/// Variables already present in the environment take precedence.
pub fn load_dotenv() -> Result<()> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/.env.toml");
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;

    for (key, value) in parse_dotenv(&contents)? {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(key, value);
        }
    }

    Ok(())
}

fn parse_dotenv(contents: &str) -> Result<Vec<(String, String)>> {
    let table: toml::Table = toml::from_str(contents)?;
    table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(value) => value,
                toml::Value::Integer(value) => value.to_string(),
                toml::Value::Boolean(value) => value.to_string(),
                other => return Err(anyhow!("unsupported value for {key}: {other}")),
            };
            Ok((key, value))
        })
        .collect()
}
