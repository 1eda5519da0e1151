use std::fs;

use clap::Parser;

#[derive(Parser)]
#[command(name = "dump_openapi", about = "Write the generated OpenAPI document to a file")]
struct Args {
    /// Port advertised in the `servers` entry
    #[arg(long, default_value_t = 8000)]
    port: u16,
    #[arg(long, default_value = "openapi.json")]
    out: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let doc = kpi_tracker::docs::build_openapi(args.port)?;
    fs::write(&args.out, serde_json::to_string_pretty(&doc)?)?;
    println!("wrote {}", args.out);
    Ok(())
}
