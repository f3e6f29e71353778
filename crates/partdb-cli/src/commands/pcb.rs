use crate::cli::{PcbCommands, PcbStockCommands};
use crate::support::{exit_with, open_repo_or_exit, print_json, repo_or_exit, to_json_or_exit};
use partdb_store::{BoardAvailability, Pcb, PcbPart};
use serde_json::json;
use std::path::Path;

/// Split a trailing `@REF` off a line.
fn split_reference(raw: &str) -> (&str, Option<String>) {
    match raw.rsplit_once('@') {
        Some((line, reference)) if !reference.trim().is_empty() => {
            (line, Some(reference.trim().to_string()))
        }
        _ => (raw, None),
    }
}

fn parse_quantity(raw: &str, line: &str) -> Result<u32, String> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| format!("`{line}`: quantity must be a whole number, got `{raw}`"))
}

/// `QTY:IPN[@REF]`.
pub fn parse_specific_line(raw: &str) -> Result<PcbPart, String> {
    let (line, reference) = split_reference(raw);
    let (quantity, ipn) = line
        .split_once(':')
        .filter(|(_, ipn)| !ipn.trim().is_empty())
        .ok_or_else(|| format!("expected QTY:IPN[@REF], got `{raw}`"))?;
    let mut part = PcbPart::specific(parse_quantity(quantity, raw)?, ipn.trim());
    part.reference = reference;
    Ok(part)
}

/// `QTY:TYPE[:CLAUSE;CLAUSE...][@REF]`.
pub fn parse_generic_line(raw: &str) -> Result<PcbPart, String> {
    let (line, reference) = split_reference(raw);
    let mut pieces = line.splitn(3, ':');
    let quantity = pieces.next().unwrap_or_default();
    let type_name = pieces
        .next()
        .map(str::trim)
        .filter(|type_name| !type_name.is_empty())
        .ok_or_else(|| format!("expected QTY:TYPE[:CLAUSES][@REF], got `{raw}`"))?;
    let clauses = pieces
        .next()
        .map(|clauses| {
            clauses
                .split(';')
                .map(str::trim)
                .filter(|clause| !clause.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let mut part = PcbPart::generic(parse_quantity(quantity, raw)?, type_name, clauses);
    part.reference = reference;
    Ok(part)
}

fn render_pcb(pcb: &Pcb) -> String {
    let mut label = format!("{} rev {}", pcb.board_name, pcb.rev);
    if let Some(sub_rev) = &pcb.sub_rev {
        label.push_str(&format!(".{sub_rev}"));
    }
    format!("{label}: {} on hand, {} lines", pcb.stock, pcb.parts.len())
}

fn render_availability(availability: &BoardAvailability) -> Vec<String> {
    availability
        .parts
        .iter()
        .map(|line| {
            let reference = line
                .reference
                .as_deref()
                .map(|reference| format!(" ({reference})"))
                .unwrap_or_default();
            let status = if line.covered() { "ok" } else { "SHORT" };
            format!(
                "{status} {}x {}{reference}: {} in stock across {} parts",
                line.quantity,
                line.description,
                line.in_stock,
                line.candidates.len()
            )
        })
        .collect()
}

pub fn run(root: &Path, command: PcbCommands, json_output: bool) {
    match command {
        PcbCommands::Add {
            board_name,
            rev,
            stock,
            sub_rev,
            storage,
            comments,
            parts,
            generic,
        } => {
            let mut pcb = Pcb::new(board_name, rev, i64::from(stock));
            pcb.sub_rev = sub_rev;
            pcb.storage = storage;
            pcb.comments = comments;
            for raw in &parts {
                pcb.parts.push(parse_specific_line(raw).unwrap_or_else(|e| exit_with(e)));
            }
            for raw in &generic {
                pcb.parts.push(parse_generic_line(raw).unwrap_or_else(|e| exit_with(e)));
            }
            let repo = open_repo_or_exit(root);
            repo_or_exit(repo.add_pcb(pcb.clone()));
            let stored = repo_or_exit(repo.get_pcb(&pcb.board_name, &pcb.rev));
            if json_output {
                print_json(&json!({
                    "action": "pcb.add",
                    "pcb": to_json_or_exit(&stored),
                }));
            } else {
                println!("partdb pcb add\n  Added: {}", render_pcb(&stored));
                for line in &stored.parts {
                    println!("  - {}x {}", line.quantity, line.part.describe());
                }
            }
        }
        PcbCommands::Get { board_name, rev } => {
            let pcb = repo_or_exit(open_repo_or_exit(root).get_pcb(&board_name, &rev));
            if json_output {
                print_json(&json!({
                    "action": "pcb.get",
                    "pcb": to_json_or_exit(&pcb),
                }));
                return;
            }
            println!("partdb pcb get\n  {}", render_pcb(&pcb));
            for line in &pcb.parts {
                match &line.reference {
                    Some(reference) => {
                        println!("  - {}x {} ({reference})", line.quantity, line.part.describe())
                    }
                    None => println!("  - {}x {}", line.quantity, line.part.describe()),
                }
            }
        }
        PcbCommands::List { board_name } => {
            let pcbs = repo_or_exit(open_repo_or_exit(root).list_pcbs(board_name.as_deref()));
            if json_output {
                let items: Vec<_> = pcbs.iter().map(to_json_or_exit).collect();
                print_json(&json!({
                    "action": "pcb.list",
                    "count": items.len(),
                    "items": items,
                }));
            } else {
                println!("partdb pcb list\n  Count: {}", pcbs.len());
                for pcb in &pcbs {
                    println!("  - {}", render_pcb(pcb));
                }
            }
        }
        PcbCommands::Delete { board_name, rev } => {
            let removed = repo_or_exit(open_repo_or_exit(root).delete_pcb(&board_name, &rev));
            if json_output {
                print_json(&json!({
                    "action": "pcb.delete",
                    "pcb": to_json_or_exit(&removed),
                }));
            } else {
                println!(
                    "partdb pcb delete\n  Deleted: {} rev {}",
                    removed.board_name, removed.rev
                );
            }
        }
        PcbCommands::Check { board_name, rev } => {
            let availability =
                repo_or_exit(open_repo_or_exit(root).pcb_availability(&board_name, &rev));
            if json_output {
                print_json(&json!({
                    "action": "pcb.check",
                    "buildable": availability.buildable(),
                    "availability": to_json_or_exit(&availability),
                }));
                return;
            }
            println!(
                "partdb pcb check\n  {} rev {}: {}",
                board_name,
                rev,
                if availability.buildable() { "buildable" } else { "short" }
            );
            for line in render_availability(&availability) {
                println!("  - {line}");
            }
        }
        PcbCommands::Stock { command } => {
            let (action, board_name, rev, delta) = match command {
                PcbStockCommands::Add {
                    board_name,
                    rev,
                    amount,
                } => ("pcb.stock.add", board_name, rev, i64::from(amount)),
                PcbStockCommands::Remove {
                    board_name,
                    rev,
                    amount,
                } => ("pcb.stock.remove", board_name, rev, -i64::from(amount)),
            };
            let stock =
                repo_or_exit(open_repo_or_exit(root).adjust_pcb_stock(&board_name, &rev, delta));
            if json_output {
                print_json(&json!({
                    "action": action,
                    "boardName": board_name,
                    "rev": rev,
                    "delta": delta,
                    "stock": stock,
                }));
            } else {
                println!(
                    "partdb {}\n  {board_name} rev {rev}: {delta:+} -> {stock}",
                    action.replace('.', " ")
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partdb_store::PartSelector;

    #[test]
    fn specific_lines_take_an_optional_reference() {
        assert_eq!(
            parse_specific_line("2:R-10k@R1 R2"),
            Ok(PcbPart::specific(2, "R-10k").reference("R1 R2"))
        );
        assert_eq!(parse_specific_line("1:NE555"), Ok(PcbPart::specific(1, "NE555")));
        assert!(parse_specific_line("two:NE555").is_err());
        assert!(parse_specific_line("1:").is_err());
    }

    #[test]
    fn generic_lines_split_clauses_on_semicolons() {
        let line = parse_generic_line("4:resistor:resistance=10k; package=0603@R1-R4")
            .expect("generic line should parse");
        assert_eq!(line.quantity, 4);
        assert_eq!(line.reference.as_deref(), Some("R1-R4"));
        assert_eq!(
            line.part,
            PartSelector::Generic {
                type_name: "resistor".to_string(),
                clauses: vec!["resistance=10k".to_string(), "package=0603".to_string()],
            }
        );
        assert_eq!(
            parse_generic_line("1:crystal"),
            Ok(PcbPart::generic(1, "crystal", Vec::new()))
        );
        assert!(parse_generic_line("1").is_err());
    }
}
