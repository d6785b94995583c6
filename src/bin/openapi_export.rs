use std::{fs, path::PathBuf};

use clap::Parser;
use storefront_api::openapi::ApiDocV1;
use utoipa::OpenApi;

/// Writes the storefront OpenAPI document to disk for client generation.
#[derive(Parser, Debug)]
#[command(name = "openapi-export")]
struct Args {
    /// Destination file; parent directories are created
    #[arg(long, default_value = "openapi/storefront-api.v1.json")]
    out: PathBuf,

    /// Emit single-line JSON instead of pretty output
    #[arg(long)]
    compact: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let doc = ApiDocV1::openapi();
    let json = if args.compact {
        serde_json::to_string(&doc)?
    } else {
        serde_json::to_string_pretty(&doc)?
    };

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.out, json)?;

    println!(
        "wrote {} paths to {}",
        doc.paths.paths.len(),
        args.out.display()
    );
    Ok(())
}
