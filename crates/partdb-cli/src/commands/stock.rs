use crate::cli::StockCommands;
use crate::support::{open_repo_or_exit, print_json, repo_or_exit};
use serde_json::json;
use std::path::Path;

pub fn run(root: &Path, command: StockCommands, json_output: bool) {
    let (action, ipn, delta) = match command {
        StockCommands::Add { ipn, amount } => ("stock.add", ipn, i64::from(amount)),
        StockCommands::Remove { ipn, amount } => ("stock.remove", ipn, -i64::from(amount)),
    };
    let repo = open_repo_or_exit(root);
    let stock = repo_or_exit(repo.adjust_stock(&ipn, delta));

    if json_output {
        print_json(&json!({
            "action": action,
            "ipn": ipn,
            "delta": delta,
            "stock": stock,
        }));
    } else {
        println!("partdb {}\n  {ipn}: {delta:+} -> {stock}", action.replace('.', " "));
    }
}
