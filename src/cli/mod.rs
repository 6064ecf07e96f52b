pub mod convert;
pub mod dashboard;
pub mod expenses;
pub mod extract;
pub mod forecast;
pub mod init;
pub mod rates;
pub mod status;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{ClerkError, Result};
use crate::expenses::SortField;
use crate::models::parse_date;
use crate::settings::{load_settings, Settings};

/// Load settings and open the configured database, refusing to create one
/// outside of `clerk init`.
pub(crate) fn open() -> Result<(Settings, Connection)> {
    let settings = load_settings();
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(ClerkError::Settings(format!(
            "No database found at {}\nRun `clerk init` to set one up.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    Ok((settings, conn))
}

pub(crate) fn parse_date_opt(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(parse_date).transpose()
}

#[derive(Parser)]
#[command(name = "clerk", about = "Receipt intake and multi-currency expense tracking.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up clerk: choose a data directory and initialize the database.
    Init {
        /// Path for clerk data (default: ~/Documents/clerk)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Base currency every expense converts into (default: SGD)
        #[arg(long = "base-currency")]
        base_currency: Option<String>,
    },
    /// Show the current database and summary statistics.
    Status,
    /// Manage expense records.
    Expenses {
        #[command(subcommand)]
        command: ExpensesCommands,
    },
    /// Extract receipt fields into an expense.
    Extract {
        /// Expense ID to update
        #[arg(required_unless_present = "dry_run")]
        id: Option<i64>,
        /// Receipt text (OCR output or pasted)
        #[arg(long, conflicts_with = "text_file")]
        text: Option<String>,
        /// Read receipt text from a file
        #[arg(long = "text-file")]
        text_file: Option<PathBuf>,
        /// Print the extraction as JSON without touching the database
        #[arg(long = "dry-run", requires = "filename")]
        dry_run: bool,
        /// Receipt filename to extract from (with --dry-run)
        #[arg(long)]
        filename: Option<String>,
    },
    /// Convert an amount into the base currency using stored rates.
    Convert {
        amount: f64,
        /// Source currency code, e.g. USD
        currency: String,
        /// Conversion date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Manage exchange rates.
    Rates {
        #[command(subcommand)]
        command: RatesCommands,
    },
    /// Spending breakdowns for approved expenses.
    Dashboard {
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Monthly history and a three-month spend forecast.
    Forecast {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Editable expense fields shared by `add` and `edit`.
#[derive(Args, Debug, Default)]
pub struct ExpenseFields {
    /// Transaction date: YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub merchant: Option<String>,
    #[arg(long)]
    pub amount: Option<f64>,
    /// Currency code, e.g. USD
    #[arg(long)]
    pub currency: Option<String>,
    /// Food, Transport, Shopping, Utilities, Healthcare, Entertainment
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum ExpensesCommands {
    /// Add an expense, optionally attaching a receipt file.
    Add {
        #[command(flatten)]
        fields: ExpenseFields,
        /// Receipt file to attach
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List expenses.
    List(ListArgs),
    /// Show one expense.
    Show { id: i64 },
    /// Edit an expense. Changing amount, currency or date re-converts it.
    Edit {
        id: i64,
        #[command(flatten)]
        fields: ExpenseFields,
        /// extracted, needs_review, approved
        #[arg(long)]
        status: Option<String>,
    },
    /// Mark an expense as approved.
    Approve { id: i64 },
    /// Export all expenses to CSV.
    Export {
        /// Output file path
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Start date: YYYY-MM-DD
    #[arg(long)]
    pub from: Option<String>,
    /// End date: YYYY-MM-DD
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// Substring match on the merchant name
    #[arg(long)]
    pub merchant: Option<String>,
    /// extracted, needs_review, approved
    #[arg(long)]
    pub status: Option<String>,
    /// Page size (1-500)
    #[arg(long, default_value = "50")]
    pub limit: u32,
    #[arg(long, default_value = "0")]
    pub offset: u32,
    #[arg(long, value_enum, default_value = "txn-date")]
    pub sort: SortField,
    #[arg(long, value_enum, default_value = "desc")]
    pub order: SortOrder,
}

#[derive(Subcommand)]
pub enum RatesCommands {
    /// Record a rate from FROM into the base currency.
    Add {
        /// Rate date: YYYY-MM-DD
        date: String,
        /// Source currency code
        currency: String,
        /// Units of base currency per unit of FROM
        rate: f64,
        #[arg(long, default_value = "manual")]
        source: String,
    },
    /// List stored rates, newest first.
    List {
        #[arg(long)]
        currency: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Seed placeholder rates for recent days.
    Sync {
        #[arg(long, default_value = "30")]
        days: u32,
    },
}
