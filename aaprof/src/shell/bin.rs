// Binary entry point for aaprof
// This is a thin wrapper that delegates to the library implementation

use anyhow::Result;

fn main() -> Result<()> {
    if let Err(e) = aaprof::shell::run() {
        eprintln!("aaprof fatal error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
