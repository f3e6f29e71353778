use crate::cli::UserCommands;
use crate::support::{open_repo_or_exit, print_json, repo_or_exit, to_json_or_exit};
use partdb_store::User;
use serde_json::json;
use std::path::Path;

pub fn run(root: &Path, command: UserCommands, json_output: bool) {
    let repo = open_repo_or_exit(root);
    match command {
        UserCommands::Add { name, comments } => {
            let mut user = User::new(name.trim());
            user.comments = comments;
            repo_or_exit(repo.add_user(user.clone()));
            if json_output {
                print_json(&json!({
                    "action": "user.add",
                    "user": to_json_or_exit(&user),
                }));
            } else {
                println!("partdb user add\n  Added: {}", user.name);
            }
        }
        UserCommands::Get { name } => {
            let user = repo_or_exit(repo.get_user(&name));
            if json_output {
                print_json(&json!({
                    "action": "user.get",
                    "user": to_json_or_exit(&user),
                }));
                return;
            }
            println!("partdb user get\n  Name: {}", user.name);
            if let Some(comments) = &user.comments {
                println!("  Comments: {comments}");
            }
        }
        UserCommands::List => {
            let users = repo_or_exit(repo.list_users());
            if json_output {
                let items: Vec<_> = users.iter().map(to_json_or_exit).collect();
                print_json(&json!({
                    "action": "user.list",
                    "count": items.len(),
                    "items": items,
                }));
            } else {
                println!("partdb user list\n  Count: {}", users.len());
                for user in &users {
                    println!("  - {}", user.name);
                }
            }
        }
    }
}
