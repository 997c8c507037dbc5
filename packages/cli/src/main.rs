use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use docstore_gateway::config::{PAGE_SIZE_VAR, TIMEOUT_VAR, TOKEN_VAR, URL_VAR};
use docstore_gateway::{ApiClient, GatewayConfig, StorageClient, StorageGateway};
use docstore_tree::{Destination, EntityId, EntityTree, Error};

/// docstore - browse and transfer projects in the document store
#[derive(Parser, Debug)]
#[command(name = "docstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Service root, e.g. https://storage.example.org/api/v1
    #[arg(long, global = true, env = URL_VAR)]
    url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, global = true, env = TOKEN_VAR, hide_env_values = true)]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = TIMEOUT_VAR)]
    timeout: Option<u64>,

    /// Children requested per listing page
    #[arg(long, global = true, env = PAGE_SIZE_VAR)]
    page_size: Option<u32>,

    /// Log every request and every materialized entity
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Explore an entity and print its subtree
    Tree(RemoteRoot),

    /// Print the entities below a container whose name matches a pattern
    Search {
        /// Regular expression matched anywhere in the name
        pattern: String,

        #[command(flatten)]
        root: RemoteRoot,
    },

    /// Upload a local file or directory into a project or folder
    Upload {
        /// Absolute path of the file or directory to upload
        local: PathBuf,

        #[arg(long)]
        dest_path: Option<String>,

        #[arg(long)]
        dest_uuid: Option<String>,
    },

    /// Download an entity and everything below it
    Download {
        #[command(flatten)]
        root: RemoteRoot,

        /// Directory to download into, the current one by default
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// List the names directly under a project or folder
    Ls {
        /// Path such as /project/folder
        path: String,
    },

    /// Create a folder, whose parent must exist
    Mkdir { path: String },

    /// Delete a file or an empty folder
    Rm { path: String },

    /// Print whether anything exists at a path
    Exists { path: String },

    /// Print the path of the entity with a UUID
    Path { uuid: String },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct RemoteRoot {
    /// UUID of the entity
    uuid: Option<String>,

    /// Slash-separated path of the entity, e.g. /project/folder
    #[arg(long)]
    path: Option<String>,
}

impl RemoteRoot {
    fn resolve(&self, tree: &mut EntityTree) -> Result<EntityId, Error> {
        match (&self.uuid, &self.path) {
            (Some(uuid), _) => tree.from_uuid(uuid),
            (None, Some(path)) => tree.from_path(path),
            (None, None) => Err(Error::Argument {
                message: "Give either a UUID or --path".to_string(),
            }),
        }
    }
}

fn config(cli: &Cli) -> Result<GatewayConfig, Error> {
    let missing = |what: &str, var: &str| docstore_gateway::Error::Config {
        message: format!("No {} given, pass --{} or set {}", what, what, var),
    };
    let url = cli.url.as_deref().ok_or_else(|| missing("url", URL_VAR))?;
    let token = cli.token.clone().ok_or_else(|| missing("token", TOKEN_VAR))?;

    let mut config = GatewayConfig::new(url, token)?;
    if let Some(seconds) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(seconds));
    }
    if let Some(page_size) = cli.page_size {
        config = config.with_page_size(page_size);
    }
    Ok(config)
}

fn print_subtree(tree: &mut EntityTree, root: EntityId) -> Result<(), Error> {
    tree.walk(root, |tree, id| {
        let mut depth = 0;
        let mut current = id;
        while current != root {
            match tree.get(current)?.parent() {
                Some(parent) => {
                    depth += 1;
                    current = parent;
                }
                None => break,
            }
        }
        println!("{}{}", "  ".repeat(depth), tree.get(id)?);
        Ok(())
    })
}

fn run(cli: Cli) -> Result<(), Error> {
    let gateway: Arc<dyn StorageGateway> = Arc::new(ApiClient::from_config(config(&cli)?)?);
    let mut tree = EntityTree::with_gateway(gateway.clone());
    let storage = StorageClient::new(gateway);

    match cli.command {
        Command::Tree(root) => {
            let id = root.resolve(&mut tree)?;
            tree.explore_subtree(id)?;
            print_subtree(&mut tree, id)?;
        }
        Command::Search { pattern, root } => {
            let id = root.resolve(&mut tree)?;
            for hit in tree.search_subtree(id, &pattern)? {
                let entity = tree.get(hit)?;
                println!("{} {}", entity, entity.remote_path().unwrap_or_default());
            }
        }
        Command::Upload {
            local,
            dest_path,
            dest_uuid,
        } => {
            let local = if local.is_absolute() {
                local
            } else {
                std::env::current_dir()?.join(local)
            };
            let id = tree.from_disk(&local)?;
            tree.upload(id, Destination::new(dest_path, dest_uuid))?;
            println!("{}", tree.get(id)?);
        }
        Command::Download { root, dest } => {
            let id = root.resolve(&mut tree)?;
            tree.download(id, dest.as_deref())?;
            if let Some(location) = tree.get(id)?.disk_location() {
                println!("{}", location.display());
            }
        }
        Command::Ls { path } => {
            for name in storage.list(&path)? {
                println!("{}", name);
            }
        }
        Command::Mkdir { path } => {
            let created = storage.mkdir(&path)?;
            println!("{}", created.uuid);
        }
        Command::Rm { path } => storage.delete(&path)?,
        Command::Exists { path } => println!("{}", storage.exists(&path)?),
        Command::Path { uuid } => println!("{}", storage.path_of(&uuid)?),
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn remote_root_needs_exactly_one_form() {
        let uuid = "2e608db7-cf2e-4e5b-b4c0-4dd4063d0cab";
        assert!(Cli::try_parse_from(["docstore", "tree", uuid]).is_ok());
        assert!(Cli::try_parse_from(["docstore", "tree", "--path", "/p"]).is_ok());
        assert!(Cli::try_parse_from(["docstore", "tree"]).is_err());
        assert!(Cli::try_parse_from(["docstore", "tree", uuid, "--path", "/p"]).is_err());
    }

    #[test]
    fn flags_build_the_config() {
        let cli = Cli::try_parse_from([
            "docstore",
            "--url",
            "https://storage.test/api/v1",
            "--token",
            "t",
            "--timeout",
            "5",
            "download",
            "--path",
            "/p",
        ])
        .unwrap();

        let config = config(&cli).unwrap();
        assert_eq!(config.base_url.as_str(), "https://storage.test/api/v1/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(matches!(cli.command, Command::Download { dest: None, .. }));
    }

    #[test]
    fn path_commands_take_one_path() {
        let cli = Cli::try_parse_from(["docstore", "rm", "/p/old"]).unwrap();
        assert!(matches!(cli.command, Command::Rm { ref path } if path == "/p/old"));
        assert!(Cli::try_parse_from(["docstore", "ls"]).is_err());
        assert!(Cli::try_parse_from(["docstore", "mkdir", "/p/new"]).is_ok());
        assert!(Cli::try_parse_from(["docstore", "exists", "/p"]).is_ok());
    }
}
