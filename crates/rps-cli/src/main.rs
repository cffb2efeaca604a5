use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rps")]
#[command(about = "Root policy status controller CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Compute a root policy's status from an object fixture and print it
    Resolve {
        /// Object fixture (YAML or JSON). Falls back to store.objects_path.
        #[arg(long)]
        objects: Option<String>,

        /// Root policy as namespace/name
        #[arg(long)]
        policy: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = rps_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Resolve {
            objects,
            policy,
            config_paths,
        } => {
            let cfg = commands::load_cli_config(&config_paths)?;
            commands::init_tracing(&cfg.log.filter);

            let objects = commands::objects_path(objects, &cfg)?;
            let report = commands::resolve::run(&objects, &policy).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
