use std::sync::Arc;
use metatree::adapter::MetadataAdapter;
use metatree::engine::store::{MetadataStore, DEFAULT_FILE_NAME};
use metatree::server::Router;
use metatree::ParameterAccess;
use clap::Parser;
use std::env;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    port: Option<String>,

    /// Target data file name (.h5/.hdf5)
    #[arg(short, long)]
    file_name: Option<String>,

    /// Directory holding the target data file
    #[arg(short = 'd', long)]
    file_dir: Option<String>,

    /// Initial metadata seed as inline JSON
    #[arg(short, long)]
    seed: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let port = args.port
        .or_else(|| env::var("METATREE_PORT").ok())
        .unwrap_or_else(|| "7001".to_string());

    let file_name = args.file_name
        .or_else(|| env::var("METATREE_FILE_NAME").ok())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

    let file_dir = args.file_dir
        .or_else(|| env::var("METATREE_FILE_DIR").ok());

    let seed = args.seed
        .or_else(|| env::var("METATREE_SEED").ok())
        .unwrap_or_else(|| "{}".to_string());
    let seed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&seed)?;

    let store = Arc::new(MetadataStore::new(&file_name, seed));
    if let Some(dir) = file_dir {
        store.set("file_dir", serde_json::Value::String(dir))?;
    }

    let adapter = Arc::new(MetadataAdapter::new(store));
    let router = Router::new(adapter);

    println!("Starting metatree daemon...");
    println!("Persisting metadata to {}", file_name);
    println!("metatree listening on :{} (TCP)", port);

    tokio::select! {
        res = router.listen(&port) => {
            if let Err(e) = res {
                eprintln!("TCP server failed: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            println!("\nShutdown signal received. Exiting.");
        }
    }

    Ok(())
}
