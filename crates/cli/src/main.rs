use anyhow::Context;
use clap::{Parser, Subcommand};
use openmrs_client::{ClientConfig, OpenmrsClient, RegistrationSession};
use reg_core::form::dummy_form_values;
use reg_core::relationships::display_relationship_types;
use reg_core::{
    compute_field_config, parse_address_template, AddressField,
    AddressValidationSchema, AddressValues, RegistrationConfig,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "reg")]
#[command(about = "Patient registration form CLI")]
struct Cli {
    /// YAML form configuration
    #[arg(long, global = true, env = "REGISTRATION_CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List address hierarchy fields, top level first
    Levels,
    /// Show whether a field is enabled and its parent search key
    FieldConfig {
        /// Address field name
        field: String,
        /// Current address values (field=value, repeatable)
        #[arg(long = "value", value_parser = parse_address_value)]
        values: Vec<(AddressField, String)>,
    },
    /// List child entries under a parent search key
    Entries {
        /// Parent values joined by `|`
        search_string: String,
        /// Keep only entries containing this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Search full addresses
    FullAddress {
        query: String,
    },
    /// Parse an address template XML file and print its rules
    ParseTemplate {
        file: PathBuf,
    },
    /// Validate address values against the address template
    ValidateAddress {
        /// Template XML file (fetched from the backend when omitted)
        #[arg(long)]
        template: Option<PathBuf>,
        /// Address values (field=value, repeatable)
        #[arg(long = "value", value_parser = parse_address_value)]
        values: Vec<(AddressField, String)>,
    },
    /// List relationship type choices
    RelationshipTypes,
    /// Print a filled-in form for testing
    DummyData,
}

fn parse_address_value(input: &str) -> Result<(AddressField, String), String> {
    let (field, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{input}'"))?;
    let field = AddressField::new(field).map_err(|e| e.to_string())?;
    Ok((field, value.to_string()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RegistrationConfig> {
    match path {
        Some(path) => RegistrationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RegistrationConfig::default()),
    }
}

fn session() -> anyhow::Result<RegistrationSession> {
    let config = ClientConfig::from_env()?;
    Ok(RegistrationSession::new(OpenmrsClient::from_config(config)?))
}

fn log_lookup_error(error: Option<openmrs_client::ClientError>) {
    if let Some(e) = error {
        tracing::error!(error = %e, "lookup failed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("reg_cli=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Levels) => {
            let fields = session()?.ordered_fields().await?;
            for (rank, field) in fields.iter().enumerate() {
                println!("{}: {}", rank, field);
            }
        }
        Some(Commands::FieldConfig { field, values }) => {
            let fields = session()?.ordered_fields().await?;
            let values: AddressValues = values.into_iter().collect();
            let cfg = compute_field_config(&fields, &values, &field);
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        Some(Commands::Entries {
            search_string,
            filter,
        }) => {
            let outcome = session()?
                .client()
                .child_entries(true, &search_string)
                .await;
            let entries = reg_core::address::filter_entries(
                &outcome.entries,
                filter.as_deref().unwrap_or(""),
            );
            if entries.is_empty() {
                println!("No entries found.");
            }
            for entry in entries {
                println!("{}", entry);
            }
            log_lookup_error(outcome.error);
        }
        Some(Commands::FullAddress { query }) => {
            let separator = &config.address_hierarchy.full_address_separator;
            let outcome = session()?
                .client()
                .full_addresses(&query, separator)
                .await;
            for address in &outcome.entries {
                println!("{}", address);
            }
            log_lookup_error(outcome.error);
        }
        Some(Commands::ParseTemplate { file }) => {
            let xml = std::fs::read_to_string(&file)
                .with_context(|| format!("reading template {}", file.display()))?;
            let rules = parse_address_template(&xml)?;
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        Some(Commands::ValidateAddress { template, values }) => {
            let schema = match template {
                Some(file) => {
                    let xml = std::fs::read_to_string(&file)
                        .with_context(|| format!("reading template {}", file.display()))?;
                    AddressValidationSchema::from_rules(&parse_address_template(&xml)?)?
                }
                None => session()?.validation_schema().await?,
            };
            let values: AddressValues = values.into_iter().collect();
            let violations = schema.validate(&values);
            if violations.is_empty() {
                println!("Address is valid.");
            }
            for v in violations {
                println!("{}: '{}' {}", v.field, v.value, v.message);
            }
        }
        Some(Commands::RelationshipTypes) => {
            let types = session()?.relationship_types().await?;
            for t in display_relationship_types(&types, &config.field_configurations.relationships)
            {
                println!("{}  {}", t.value(), t.display);
            }
        }
        Some(Commands::DummyData) => {
            println!("{}", serde_json::to_string_pretty(&dummy_form_values())?);
        }
        None => {
            println!("Use 'reg --help' for commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_values() {
        let (field, value) = parse_address_value("cityVillage=San Isidro").unwrap();
        assert_eq!(field.as_str(), "cityVillage");
        assert_eq!(value, "San Isidro");

        let (_, empty) = parse_address_value("postalCode=").unwrap();
        assert_eq!(empty, "");
    }

    #[test]
    fn rejects_malformed_address_values() {
        assert!(parse_address_value("cityVillage").is_err());
        assert!(parse_address_value("city village=x").is_err());
    }

    #[test]
    fn cli_parses_repeated_values() {
        let cli = Cli::try_parse_from([
            "reg",
            "field-config",
            "cityVillage",
            "--value",
            "country=Perú",
            "--value",
            "stateProvince=Lima",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::FieldConfig { field, values }) => {
                assert_eq!(field, "cityVillage");
                assert_eq!(values.len(), 2);
            }
            _ => panic!("expected field-config"),
        }
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.address_hierarchy.full_address_separator, " > ");
    }
}
