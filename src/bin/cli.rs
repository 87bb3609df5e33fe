// src/bin/cli.rs
use gr_enhance::cli;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    cli::run()
}
