use metatree::sdk::Client;
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:7001")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Read a parameter or subtree
    Get {
        path: String,
        /// Include per-leaf annotations (value, writeability, type)
        #[arg(long)]
        meta: bool,
    },
    /// Write a parameter; the value is parsed as JSON, else taken as a string
    Set { path: String, value: String },
    /// Trigger a metadata write to the target file
    Write,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::connect(&cli.addr).await?;

    match cli.command {
        Commands::Get { path, meta } => {
            let val = if meta {
                client.get_with_metadata(&path).await?
            } else {
                client.get(&path).await?
            };
            println!("{}", serde_json::to_string_pretty(&val)?);
        }
        Commands::Set { path, value } => {
            let val: Value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            let stored = client.put(&path, val).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Commands::Write => {
            client.write().await?;
            println!("OK");
        }
    }

    Ok(())
}
