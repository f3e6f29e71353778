//! partdb CLI: the `partdb` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let config = support::load_config_or_exit(cli.config.as_deref());
    support::init_tracing(&config);
    let root = support::store_root(&config, cli.store.as_deref());
    let json = cli.json;

    match cli.command {
        Commands::Init => commands::init::run(&root, json),

        Commands::Types { type_name } => commands::types::run(type_name, json),

        Commands::Add { type_name, set } => commands::part::run_add(&root, type_name, set, json),

        Commands::Get { ipn } => commands::part::run_get(&root, ipn, json),

        Commands::Delete { ipn } => commands::part::run_delete(&root, ipn, json),

        Commands::Update { ipn, set } => commands::part::run_update(&root, ipn, set, json),

        Commands::List { type_name, clauses } => {
            commands::list::run(&root, type_name, clauses, json)
        }

        Commands::Ipns { type_name } => commands::list::run_ipns(&root, type_name, json),

        Commands::Stock { command } => commands::stock::run(&root, command, json),

        Commands::Pcb { command } => commands::pcb::run(&root, command, json),

        Commands::User { command } => commands::user::run(&root, command, json),

        Commands::Migrate { to } => commands::migrate::run(&root, to, json),

        Commands::Version => commands::migrate::run_version(&root, json),
    }
}
