use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use aro_core::Document;
use aro_dynamichelper::clean::clean_new_object;
use aro_dynamichelper::defaults::normalize;
use aro_dynamichelper::{DynamicHelper, KubeResourceClient, OrderingPolicy, Outcome, UpdatePolicy};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};

mod manifest;

#[derive(Parser, Debug)]
#[command(name = "aroctl", version, about = "Declarative create-or-update for Kubernetes manifests")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: current context; `list` defaults to all)
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Order {
    GroupKind,
    Kind,
}

impl From<Order> for OrderingPolicy {
    fn from(o: Order) -> Self {
        match o {
            Order::GroupKind => OrderingPolicy::GroupKind,
            Order::Kind => OrderingPolicy::Kind,
        }
    }
}

#[derive(Args, Debug, Clone, Copy)]
struct PolicyArgs {
    /// Log a JSON Patch of each update (never for Secrets)
    #[arg(long = "log-changes", env = "ARO_LOG_CHANGES", action = ArgAction::SetTrue)]
    log_changes: bool,
    /// Retry the get/compare/update cycle on write conflicts
    #[arg(long = "retry-on-conflict", env = "ARO_RETRY_ON_CONFLICT", action = ArgAction::SetTrue)]
    retry_on_conflict: bool,
    /// Skip updates that would not change the live object
    #[arg(long = "avoid-unnecessary-updates", env = "ARO_AVOID_UNNECESSARY_UPDATES", action = ArgAction::SetTrue)]
    avoid_unnecessary_updates: bool,
    /// Compare normalised copies so server defaults are not a change
    #[arg(long = "ignore-defaults", env = "ARO_IGNORE_DEFAULTS", action = ArgAction::SetTrue)]
    ignore_defaults: bool,
    /// Refresh discovery and retry when a kind is not served yet
    #[arg(long = "refresh-on-not-found", env = "ARO_REFRESH_ON_NOT_FOUND", action = ArgAction::SetTrue)]
    refresh_on_not_found: bool,
}

impl From<PolicyArgs> for UpdatePolicy {
    fn from(a: PolicyArgs) -> Self {
        UpdatePolicy {
            log_changes: a.log_changes,
            retry_on_conflict: a.retry_on_conflict,
            avoid_unnecessary_updates: a.avoid_unnecessary_updates,
            ignore_defaults: a.ignore_defaults,
            refresh_api_resources_on_not_found: a.refresh_on_not_found,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update every object in the given manifests
    Apply {
        /// Manifest files (multi-document YAML)
        #[arg(short = 'f', long = "filename", required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        policy: PolicyArgs,
        /// Apply order table
        #[arg(long = "order", value_enum, default_value_t = Order::GroupKind)]
        order: Order,
        /// Carry on past objects that fail
        #[arg(long = "keep-going", action = ArgAction::SetTrue)]
        keep_going: bool,
    },
    /// Fetch one object, e.g. `get Deployment.apps web`
    Get { group_kind: String, name: String },
    /// List objects of a kind
    List { group_kind: String },
    /// Delete one object
    Delete {
        group_kind: String,
        name: String,
        /// Treat an absent object as success
        #[arg(long = "ignore-not-found", action = ArgAction::SetTrue)]
        ignore_not_found: bool,
    },
    /// Resolve a kind to the resource serving it
    Resolve {
        group_kind: String,
        #[arg(long = "version")]
        version: Option<String>,
    },
    /// Print the normalised (clean + defaults) form of manifests; no cluster access
    Normalize {
        #[arg(short = 'f', long = "filename", required = true)]
        files: Vec<PathBuf>,
    },
    /// Discover served resources (incl. CRDs)
    Discover,
}

fn init_tracing() {
    let env = std::env::var("ARO_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("ARO_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid ARO_METRICS_ADDR; expected host:port");
        }
    }
}

async fn connect(policy: UpdatePolicy) -> Result<(kube::Client, DynamicHelper)> {
    let client = aro_kubehub::get_kube_client().await?;
    let helper = DynamicHelper::new(Arc::new(KubeResourceClient::new(client.clone())), policy)
        .await
        .context("loading api resources")?;
    Ok((client, helper))
}

fn print_doc(output: Output, doc: &Document) -> Result<()> {
    match output {
        Output::Human => print!("{}", serde_yaml::to_string(doc)?),
        Output::Json => println!("{}", serde_json::to_string_pretty(doc)?),
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct ApplyRow {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply { files, policy, order, keep_going } => {
            let mut docs = manifest::read_files(&files)?;
            docs.iter_mut().for_each(clean_new_object);
            let (client, helper) = connect(policy.into()).await?;
            let ns = cli.namespace.clone().unwrap_or_else(|| client.default_namespace().to_string());
            for doc in &mut docs {
                helper.default_namespace(doc, &ns)?;
            }
            info!(objects = docs.len(), ns = %ns, ?order, keep_going, "apply invoked");
            let helper = helper.with_ordering(order.into());

            let rows: Vec<ApplyRow> = if keep_going {
                helper
                    .ensure_each(docs)
                    .await
                    .into_iter()
                    .map(|(key, res)| match res {
                        Ok(o) => ApplyRow { key: key.to_string(), outcome: Some(o), error: None },
                        Err(e) => ApplyRow { key: key.to_string(), outcome: None, error: Some(e.to_string()) },
                    })
                    .collect()
            } else {
                match helper.ensure(docs).await {
                    Ok(done) => done
                        .into_iter()
                        .map(|(key, o)| ApplyRow { key: key.to_string(), outcome: Some(o), error: None })
                        .collect(),
                    Err(e) => {
                        error!(error = %e, "apply failed");
                        return Err(e.into());
                    }
                }
            };

            match cli.output {
                Output::Human => {
                    for r in &rows {
                        match (&r.outcome, &r.error) {
                            (Some(o), _) => println!("{} {}", r.key, serde_json::to_value(o)?.as_str().unwrap_or("")),
                            (None, Some(e)) => println!("{} failed: {}", r.key, e),
                            (None, None) => {}
                        }
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
            let failed = rows.iter().filter(|r| r.error.is_some()).count();
            if failed > 0 {
                bail!("{} of {} objects failed", failed, rows.len());
            }
        }
        Commands::Get { group_kind, name } => {
            let (client, helper) = connect(UpdatePolicy::default()).await?;
            let ns = cli.namespace.clone().unwrap_or_else(|| client.default_namespace().to_string());
            info!(group_kind = %group_kind, ns = %ns, name = %name, "get invoked");
            let doc = helper.get(&group_kind, &ns, &name).await?;
            print_doc(cli.output, &doc)?;
        }
        Commands::List { group_kind } => {
            let (_, helper) = connect(UpdatePolicy::default()).await?;
            let ns = cli.namespace.clone().unwrap_or_default();
            info!(group_kind = %group_kind, ns = %ns, "list invoked");
            let list = helper.list(&group_kind, &ns).await?;
            match cli.output {
                Output::Human => {
                    println!("NAMESPACE   NAME");
                    let items = list.get("items").and_then(|i| i.as_array()).map(Vec::as_slice).unwrap_or_default();
                    for item in items {
                        let ns_col = aro_core::meta::namespace(item).unwrap_or("-");
                        println!("{:<11} {}", ns_col, aro_core::meta::name(item).unwrap_or(""));
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&list)?),
            }
        }
        Commands::Delete { group_kind, name, ignore_not_found } => {
            let (client, helper) = connect(UpdatePolicy::default()).await?;
            let ns = cli.namespace.clone().unwrap_or_else(|| client.default_namespace().to_string());
            info!(group_kind = %group_kind, ns = %ns, name = %name, "delete invoked");
            if ignore_not_found {
                helper.ensure_deleted(&group_kind, &ns, &name).await?;
            } else {
                helper.delete(&group_kind, &ns, &name).await?;
            }
            println!("{} {} deleted", group_kind, name);
        }
        Commands::Resolve { group_kind, version } => {
            let (_, helper) = connect(UpdatePolicy::default()).await?;
            let gvr = helper.resolve(&group_kind, version.as_deref())?;
            match cli.output {
                Output::Human => println!("{}\t{}", gvr, gvr.url_path(cli.namespace.as_deref(), None)),
                Output::Json => println!("{}", serde_json::to_string_pretty(&gvr)?),
            }
        }
        Commands::Normalize { files } => {
            let mut docs = manifest::read_files(&files)?;
            docs.iter_mut().for_each(normalize);
            match cli.output {
                Output::Human => {
                    for (i, doc) in docs.iter().enumerate() {
                        if i > 0 {
                            println!("---");
                        }
                        print_doc(Output::Human, doc)?;
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&docs)?),
            }
        }
        Commands::Discover => {
            let client = aro_kubehub::get_kube_client().await?;
            let resources = aro_kubehub::discover(&client).await?;
            match cli.output {
                Output::Human => {
                    for r in resources {
                        let scope = if r.namespaced { "namespaced" } else { "cluster" };
                        println!("{} • {} • {}", r.gvk_key(), r.plural, scope);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&resources)?),
            }
        }
    }

    Ok(())
}
