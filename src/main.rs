use std::fs::read_to_string;

use anyhow::{Context, Result};
use predlib::{generate, CellInstance, LibraryConfig, LogDiagnostics};

fn main() -> Result<()> {
    clilog::init_stderr_color_debug();

    let mut args = std::env::args_os().skip(1);
    let cells_path = args.next().context("Usage: predlib <cells.json> [out.lib]")?;
    let out_path = args.next();

    let config = match std::env::var_os("PREDLIB_CONFIG") {
        Some(path) => LibraryConfig::from_toml_file(&path)
            .with_context(|| format!("Could not load config {:?}", path))?,
        None => {
            clilog::info!("No PREDLIB_CONFIG specified, using default library settings");
            LibraryConfig::default()
        }
    };

    let content = read_to_string(&cells_path)
        .with_context(|| format!("Could not read cells file {:?}", cells_path))?;
    let cells: Vec<CellInstance> = serde_json::from_str(&content).context("Could not parse cells file")?;
    clilog::info!("# Cells = {}", cells.len());

    let text = generate(&cells, &config, &mut LogDiagnostics)?;

    match out_path {
        Some(path) => {
            std::fs::write(&path, text + "\n").with_context(|| format!("Could not write {:?}", path))?;
            clilog::info!("Wrote library {} to {:?}", config.name, path);
        }
        None => println!("{}", text),
    }
    Ok(())
}
