#[tokio::main]
async fn main() {
    if let Err(err) = mold_mcp::mcp::server::run_stdio().await {
        eprintln!("mold-mcp: {}", err);
        if let Some(hint) = &err.hint {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }
}
