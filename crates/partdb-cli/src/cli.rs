use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "partdb",
    about = "partdb: spec-driven electronic parts inventory",
    version
)]
pub struct Cli {
    /// Store directory (overrides `store.path` from the config file)
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Path to a partdb.toml config file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the store directory and stamp the current schema version
    Init,

    /// List the part type catalog, or show one type's fields
    Types {
        /// Part type name, e.g. `resistor`
        type_name: Option<String>,
    },

    /// Add a new part
    Add {
        /// Part type name
        type_name: String,

        /// Field assignment `name=value`; repeatable (`ipn` is required)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    /// Show one part
    Get {
        ipn: String,
    },

    /// Delete one part
    Delete {
        ipn: String,
    },

    /// Change fields of one part; an empty value clears an optional field
    Update {
        ipn: String,

        /// Field assignment `name=value`; repeatable
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    /// List parts, optionally of one type and matching every `--where` clause
    List {
        /// Part type name
        type_name: Option<String>,

        /// Filter clause such as `resistance>=1k` or `package=0603`; repeatable
        #[arg(long = "where", value_name = "CLAUSE")]
        clauses: Vec<String>,
    },

    /// List part IPNs
    Ipns {
        /// Part type name
        type_name: Option<String>,
    },

    /// Adjust stock counts
    Stock {
        #[command(subcommand)]
        command: StockCommands,
    },

    /// Manage PCB assemblies and their bills of materials
    Pcb {
        #[command(subcommand)]
        command: PcbCommands,
    },

    /// Manage the users parts can be assigned to
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Migrate the store to the current (or given) schema version
    Migrate {
        /// Target schema version
        #[arg(long)]
        to: Option<String>,
    },

    /// Show the store's schema version and whether it needs migrating
    Version,
}

#[derive(Subcommand)]
pub enum StockCommands {
    /// Add to a part's stock
    Add {
        ipn: String,
        amount: u32,
    },

    /// Remove from a part's stock
    Remove {
        ipn: String,
        amount: u32,
    },
}

#[derive(Subcommand)]
pub enum PcbCommands {
    /// Add a board revision and its bill of materials
    Add {
        board_name: String,
        rev: String,

        /// Boards on hand
        #[arg(long, default_value_t = 0)]
        stock: u32,

        #[arg(long)]
        sub_rev: Option<String>,

        #[arg(long)]
        storage: Option<String>,

        #[arg(long)]
        comments: Option<String>,

        /// Line naming one part, `QTY:IPN[@REF]`; repeatable
        #[arg(long = "part", value_name = "QTY:IPN[@REF]")]
        parts: Vec<String>,

        /// Line any matching part can fill, `QTY:TYPE[:CLAUSE;CLAUSE...][@REF]`; repeatable
        #[arg(long = "generic", value_name = "QTY:TYPE[:CLAUSES][@REF]")]
        generic: Vec<String>,
    },

    /// Show one board revision
    Get {
        board_name: String,
        rev: String,
    },

    /// List boards, optionally every revision of one board
    List {
        board_name: Option<String>,
    },

    /// Delete one board revision
    Delete {
        board_name: String,
        rev: String,
    },

    /// Check whether stock covers one more board
    Check {
        board_name: String,
        rev: String,
    },

    /// Adjust how many boards are on hand
    Stock {
        #[command(subcommand)]
        command: PcbStockCommands,
    },
}

#[derive(Subcommand)]
pub enum PcbStockCommands {
    Add {
        board_name: String,
        rev: String,
        amount: u32,
    },

    Remove {
        board_name: String,
        rev: String,
        amount: u32,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a user
    Add {
        name: String,

        #[arg(long)]
        comments: Option<String>,
    },

    /// Show one user
    Get {
        name: String,
    },

    /// List users
    List,
}
