pub mod init;
pub mod list;
pub mod migrate;
pub mod part;
pub mod pcb;
pub mod stock;
pub mod types;
pub mod user;
