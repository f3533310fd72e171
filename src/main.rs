use std::io::Read;

use clap::Parser;
use ctxvault::cli::{Cli, Commands};
use ctxvault::commands::{self, resolve_against};
use ctxvault::config::Config;
use ctxvault::engine::WriteOptions;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::parse_from(["ctxvault", "--help"]);
        return Ok(());
    };

    let config = Config::load()?;
    ctxvault::logging::init(&config.logging)?;
    let engine = commands::open_engine(&config)?;
    let cwd = std::env::current_dir()?;

    match command {
        Commands::Init { name, path } => {
            let path = resolve_against(&cwd, path);
            let vault = engine.init_vault(&name, path.as_deref())?;
            println!(
                "{}",
                commands::format_init(&name, &vault, &engine.registry_location())
            );
        }
        Commands::Index { name, path } => {
            let path = resolve_against(&cwd, path);
            let outcome = engine.index(&name, path.as_deref())?;
            println!("{}", commands::format_outcome("Indexed", &outcome));
        }
        Commands::Reindex { name, path } => {
            let path = resolve_against(&cwd, path);
            let outcome = engine.reindex(&name, path.as_deref())?;
            println!("{}", commands::format_outcome("Reindexed", &outcome));
        }
        Commands::Delete { name, path } => {
            let path = resolve_against(&cwd, Some(path));
            let outcome = engine.delete(&name, path.as_deref())?;
            println!("{}", commands::format_outcome("Deleted", &outcome));
        }
        Commands::Query {
            name,
            text,
            top_k,
            filters,
        } => {
            let filter = commands::parse_filter(&filters)?;
            let hits = engine.query(&name, &text, top_k, filter.as_ref())?;
            println!("{}", commands::format_hits(&hits));
        }
        Commands::Docs { name } => {
            let documents = engine.list_documents(&name)?;
            println!("{}", commands::format_documents(&documents));
        }
        Commands::Vaults => {
            let vaults = engine.list_vaults()?;
            println!("{}", commands::format_vaults(&vaults));
        }
        Commands::Write {
            name,
            path,
            file,
            overwrite,
            generated_by,
        } => {
            let content = match file {
                Some(file) => std::fs::read_to_string(&file)?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };

            let options = WriteOptions {
                overwrite,
                generated_by,
            };
            let written = engine.write_document(&name, &path, &content, &options)?;
            println!(
                "Written: {} ({} chunks)",
                written.path.display(),
                written.chunks
            );
        }
        #[cfg(feature = "mcp")]
        Commands::Serve => {
            tokio::runtime::Runtime::new()?.block_on(ctxvault::mcp::serve(engine))?;
        }
    }

    Ok(())
}
