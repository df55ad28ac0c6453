//! insight - command line access to Jira Insight
//!
//! Results are printed to stdout as pretty JSON.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use insight_client::api::{
    self, ApiError, AttributeQuery, InsightClient, IqlQuery, ObjectCollection,
};
use insight_client::config::{AuthKind, Config, ConfigError, Profile};
use insight_client::error::AppError;
use insight_client::logging;
use insight_client::schema::ObjectTypeGraph;

/// Query and inspect Jira Insight object schemas.
#[derive(Parser)]
#[command(name = "insight", version, about)]
struct Cli {
    /// Profile to use instead of the default one
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List object schemas
    Schemas,

    /// Show one object schema
    Schema {
        schema_id: i64,
    },

    /// List the object types of a schema
    ObjectTypes {
        schema_id: i64,

        /// Include nested object types
        #[arg(long)]
        flat: bool,
    },

    /// List attribute definitions of a schema or an object type
    Attributes {
        /// Schema ID, or object type ID with --object-type
        id: i64,

        /// Treat the ID as an object type
        #[arg(long)]
        object_type: bool,

        /// Only attributes whose name starts with this
        #[arg(long)]
        query: Option<String>,
    },

    /// Run an IQL query
    Iql(QueryArgs),

    /// Run an AQL query
    Aql(QueryArgs),

    /// Show one object
    Object {
        object_id: i64,

        /// Show the change history instead
        #[arg(long)]
        history: bool,
    },

    /// Print the object types of a schema, parents before children
    CreationOrder {
        schema_id: i64,
    },

    /// List status types
    StatusTypes {
        /// Only the status types of this schema
        #[arg(long)]
        schema: Option<i64>,
    },

    /// Manage connection profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(clap::Args)]
struct QueryArgs {
    /// The query, e.g. 'objectType = "Host"'
    query: String,

    /// Limit the search to one schema
    #[arg(long)]
    schema: Option<i64>,

    /// Page to fetch (ignored with --all)
    #[arg(long, default_value = "1")]
    page: u32,

    /// Results per page (defaults to the configured value)
    #[arg(long)]
    per_page: Option<u32>,

    /// Fetch every page
    #[arg(long)]
    all: bool,

    /// Stop after this many pages with --all
    #[arg(long)]
    max_pages: Option<u32>,

    /// Print objects as key, label and attribute values
    #[arg(long)]
    flatten: bool,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Add a profile and store its secret in the system keyring
    Add {
        name: String,
        url: String,

        /// Authentication type
        #[arg(long, value_enum, default_value = "token")]
        auth: AuthArg,

        /// Username for basic authentication
        #[arg(long)]
        username: Option<String>,

        /// The site is Jira cloud
        #[arg(long)]
        cloud: bool,

        /// Skip TLS certificate verification
        #[arg(long)]
        insecure: bool,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// List profiles
    List,

    /// Remove a profile and its stored secret
    Remove {
        name: String,
    },

    /// Set the default profile
    Default {
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AuthArg {
    Token,
    Basic,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Command failed: {:#}", e);
            report(&e);
            1
        }
    };

    logging::shutdown();
    std::process::exit(code);
}

/// Print an error, preferring the user-facing message when there is one.
fn report(error: &anyhow::Error) {
    match error.downcast_ref::<AppError>() {
        Some(app) => {
            eprintln!("Error: {}", app.user_message());
            if let Some(action) = app.suggested_action() {
                eprintln!("Hint: {}", action);
            }
        }
        None => eprintln!("Error: {:#}", error),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().map_err(AppError::from)?;

    if let Commands::Profile { command } = cli.command {
        return run_profile(config, command);
    }

    let profile = config
        .resolve_profile(cli.profile.as_deref())
        .map_err(AppError::from)?;
    info!(profile = %profile.name, "Connecting to Insight");
    let client = InsightClient::new(profile, &config.settings)
        .await
        .map_err(AppError::from)?;

    let output = execute(&client, &config, cli.command)
        .await
        .map_err(AppError::from)?;
    client.close().await;

    print_json(&output)
}

async fn execute(client: &InsightClient, config: &Config, command: Commands) -> api::Result<Value> {
    let value = match command {
        Commands::Schemas => to_value(&client.get_object_schemas().await?)?,
        Commands::Schema { schema_id } => to_value(&client.get_object_schema(schema_id).await?)?,
        Commands::ObjectTypes { schema_id, flat } => {
            let types = if flat {
                client.get_object_schema_object_types_flat(schema_id).await?
            } else {
                client.get_object_schema_object_types(schema_id).await?
            };
            to_value(&types)?
        }
        Commands::Attributes {
            id,
            object_type,
            query,
        } => {
            let attributes = if object_type {
                let filters = AttributeQuery {
                    query,
                    ..AttributeQuery::for_object_type()
                };
                client.get_object_type_attributes(id, &filters).await?
            } else {
                let filters = AttributeQuery {
                    query,
                    ..AttributeQuery::default()
                };
                client.get_object_schema_attributes(id, &filters).await?
            };
            to_value(&attributes)?
        }
        Commands::Iql(args) => run_query(client, config, args, false).await?,
        Commands::Aql(args) => run_query(client, config, args, true).await?,
        Commands::Object { object_id, history } => {
            if history {
                client.get_object_history(object_id, false, true).await?
            } else {
                to_value(&client.get_object(object_id).await?)?
            }
        }
        Commands::CreationOrder { schema_id } => {
            let types = client.get_object_schema_object_types_flat(schema_id).await?;
            let graph = ObjectTypeGraph::new(types);
            to_value(&graph.creation_order())?
        }
        Commands::StatusTypes { schema } => to_value(&client.get_status_types(schema).await?)?,
        Commands::Profile { .. } => Value::Null,
    };
    Ok(value)
}

async fn run_query(
    client: &InsightClient,
    config: &Config,
    args: QueryArgs,
    aql: bool,
) -> api::Result<Value> {
    let mut query = IqlQuery::new(args.query)
        .results_per_page(args.per_page.unwrap_or(config.settings.results_per_page))
        .page(args.page);
    if let Some(schema) = args.schema {
        query = query.schema(schema);
    }

    let collection = if args.all {
        if aql {
            client.aql_all(&query, args.max_pages).await?
        } else {
            client.iql_all(&query, args.max_pages).await?
        }
    } else {
        let page = if aql {
            client.aql(&query).await?
        } else {
            client.iql(&query).await?
        };
        ObjectCollection::from_pages(vec![page])
    };

    if args.flatten {
        Ok(flatten(&collection))
    } else {
        to_value(&collection)
    }
}

fn flatten(collection: &ObjectCollection) -> Value {
    let objects: Vec<Value> = collection
        .objects
        .iter()
        .map(|object| {
            json!({
                "objectKey": object.object_key,
                "label": object.label,
                "attributes": object.flatten_attributes(&collection.object_type_attributes),
            })
        })
        .collect();
    json!({
        "totalFilterCount": collection.total_filter_count,
        "objects": objects,
    })
}

fn run_profile(mut config: Config, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::Add {
            name,
            url,
            auth,
            username,
            cloud,
            insecure,
            default,
        } => {
            let mut profile = match auth {
                AuthArg::Token => Profile::new(name, url),
                AuthArg::Basic => {
                    let username = username.context("--username is required for basic auth")?;
                    Profile::with_basic_auth(name, url, username)
                }
            };
            profile.cloud = cloud;
            profile.verify_ssl = !insecure;
            profile.validate().map_err(AppError::from)?;

            let prompt = match profile.auth {
                AuthKind::Token => "API token",
                AuthKind::Basic => "Password",
            };
            let secret = read_secret(prompt)?;

            let name = profile.name.clone();
            config.add_profile(profile).map_err(AppError::from)?;
            if default || config.settings.default_profile.is_none() {
                config.set_default_profile(&name).map_err(AppError::from)?;
            }
            commit_profile(
                || api::auth::store_secret(&name, &secret),
                || config.save(),
                || api::auth::delete_secret(&name),
            )?;
            info!(profile = %name, "Profile added");
            eprintln!("Profile '{}' added.", name);
            Ok(())
        }
        ProfileCommands::List => {
            let default = config.settings.default_profile.as_deref();
            let profiles: Vec<Value> = config
                .profiles
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name,
                        "url": p.url,
                        "auth": p.auth,
                        "cloud": p.cloud,
                        "default": Some(p.name.as_str()) == default,
                        "hasSecret": api::auth::has_secret(&p.name),
                    })
                })
                .collect();
            print_json(&Value::Array(profiles))
        }
        ProfileCommands::Remove { name } => {
            config.remove_profile(&name).map_err(AppError::from)?;
            config.save().map_err(AppError::from)?;
            if let Err(e) = api::auth::delete_secret(&name) {
                warn!(profile = %name, "Could not delete stored secret: {}", e);
            }
            eprintln!("Profile '{}' removed.", name);
            Ok(())
        }
        ProfileCommands::Default { name } => {
            config.set_default_profile(&name).map_err(AppError::from)?;
            config.save().map_err(AppError::from)?;
            eprintln!("Default profile set to '{}'.", name);
            Ok(())
        }
    }
}

/// Store a new profile's secret, then save the configuration.
///
/// If the save fails the secret is deleted again, so the keyring never holds
/// a secret for a profile that is not in the file.
fn commit_profile(
    store_secret: impl FnOnce() -> api::Result<()>,
    save_config: impl FnOnce() -> std::result::Result<(), ConfigError>,
    delete_secret: impl FnOnce() -> api::Result<()>,
) -> std::result::Result<(), AppError> {
    store_secret()?;
    if let Err(e) = save_config() {
        if let Err(cleanup) = delete_secret() {
            warn!("Could not remove secret after failed save: {}", cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Read a secret from the first line of stdin.
fn read_secret(prompt: &str) -> Result<String> {
    eprint!("{}: ", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read secret from stdin")?;
    let secret = line.trim().to_string();
    if secret.is_empty() {
        anyhow::bail!("{} must not be empty", prompt);
    }
    Ok(secret)
}

fn to_value<T: Serialize>(value: &T) -> api::Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode output: {}", e)))
}

fn print_json(value: &Value) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[test]
    fn test_to_value_reports_encoding_errors() {
        let mut unencodable = HashMap::new();
        unencodable.insert((1, 2), "tuple keys are not JSON object keys");

        let err = to_value(&unencodable).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        assert!(err.to_string().contains("Failed to encode output"));
    }

    #[test]
    fn test_commit_profile_removes_secret_when_save_fails() {
        let calls = RefCell::new(Vec::new());

        let result = commit_profile(
            || {
                calls.borrow_mut().push("store");
                Ok(())
            },
            || {
                calls.borrow_mut().push("save");
                Err(ConfigError::ValidationError("disk full".to_string()))
            },
            || {
                calls.borrow_mut().push("delete");
                Ok(())
            },
        );

        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::ValidationError(_)))
        ));
        assert_eq!(*calls.borrow(), vec!["store", "save", "delete"]);
    }

    #[test]
    fn test_commit_profile_keeps_secret_on_success() {
        let calls = RefCell::new(Vec::new());

        commit_profile(
            || {
                calls.borrow_mut().push("store");
                Ok(())
            },
            || {
                calls.borrow_mut().push("save");
                Ok(())
            },
            || {
                calls.borrow_mut().push("delete");
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(*calls.borrow(), vec!["store", "save"]);
    }

    #[test]
    fn test_commit_profile_skips_save_when_store_fails() {
        let saved = RefCell::new(false);

        let result = commit_profile(
            || Err(ApiError::Keyring("locked".to_string())),
            || {
                *saved.borrow_mut() = true;
                Ok(())
            },
            || Ok(()),
        );

        assert!(matches!(result, Err(AppError::Api(ApiError::Keyring(_)))));
        assert!(!*saved.borrow());
    }
}
