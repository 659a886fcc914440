//! Output formatting for resolved settings.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use dbsettings::{ConnectionStringBuilder, ResolvedEntry};
use serde::Serialize;

const REDACTED: &str = "********";

/// One printable row.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRow {
    pub name: String,
    pub provider_name: String,
    pub origin: String,
    pub connection_string: String,
}

impl SettingsRow {
    pub fn from_entry(entry: &ResolvedEntry, show_secrets: bool) -> Self {
        let connection_string = if show_secrets {
            entry.settings.connection_string().to_string()
        } else {
            redact_password(entry.settings.connection_string())
        };
        Self {
            name: entry.settings.name().to_string(),
            provider_name: entry.settings.provider_name().to_string(),
            origin: entry.origin.to_string(),
            connection_string,
        }
    }
}

/// Mask the password of a connection string.
///
/// Strings that do not parse are masked entirely.
pub fn redact_password(connection_string: &str) -> String {
    match ConnectionStringBuilder::parse(connection_string) {
        Ok(mut builder) if builder.password().is_some() => {
            builder.set_password(REDACTED);
            builder.to_string()
        }
        Ok(_) => connection_string.to_string(),
        Err(_) => REDACTED.to_string(),
    }
}

/// Render rows as a table, sorted by name.
pub fn render_table(rows: &mut [SettingsRow]) -> String {
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["NAME", "PROVIDER", "ORIGIN", "CONNECTION STRING"]);

    for row in rows.iter() {
        let name = if row.name.is_empty() {
            "(empty)"
        } else {
            row.name.as_str()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(&row.provider_name),
            Cell::new(&row.origin),
            Cell::new(&row.connection_string),
        ]);
    }

    table.to_string()
}

pub fn render_json(rows: &mut [SettingsRow]) -> anyhow::Result<String> {
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(serde_json::to_string_pretty(rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_password() {
        assert_eq!(
            redact_password("Data Source=db;User ID=sa;Password=hunter2"),
            "Data Source=db;User ID=sa;Password=********"
        );
        assert_eq!(
            redact_password("Data Source=db;Integrated Security=True"),
            "Data Source=db;Integrated Security=True"
        );
        assert_eq!(redact_password("not a connection string"), REDACTED);
    }

    #[test]
    fn test_redact_unparseable_hides_password() {
        let masked = redact_password("Data Source=db;Password=hunter2;junk");
        assert!(!masked.contains("hunter2"));
        assert_eq!(masked, REDACTED);

        let masked = redact_password("Data Source=db;PWD='open");
        assert!(!masked.contains("open"));
    }

    #[test]
    fn test_render_json_sorted() {
        let mut rows = vec![
            SettingsRow {
                name: "b".into(),
                provider_name: "p".into(),
                origin: "registered".into(),
                connection_string: "Data Source=b".into(),
            },
            SettingsRow {
                name: "a".into(),
                provider_name: "p".into(),
                origin: "configured".into(),
                connection_string: "Data Source=a".into(),
            },
        ];
        let json = render_json(&mut rows).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["name"], "a");
        assert_eq!(parsed[1]["connectionString"], "Data Source=b");
    }
}
