use clap::Parser;

use clerk::cli::{self, Cli, Commands, ExpensesCommands, RatesCommands};

fn main() {
    clerk::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            base_currency,
        } => cli::init::run(data_dir, base_currency),
        Commands::Status => cli::status::run(),
        Commands::Expenses { command } => match command {
            ExpensesCommands::Add { fields, file } => cli::expenses::add(fields, file),
            ExpensesCommands::List(args) => cli::expenses::list(args),
            ExpensesCommands::Show { id } => cli::expenses::show(id),
            ExpensesCommands::Edit { id, fields, status } => cli::expenses::edit(id, fields, status),
            ExpensesCommands::Approve { id } => cli::expenses::approve(id),
            ExpensesCommands::Export { output } => cli::expenses::export(&output),
        },
        Commands::Extract {
            id,
            text,
            text_file,
            dry_run,
            filename,
        } => cli::extract::run(id, text, text_file, dry_run, filename),
        Commands::Convert {
            amount,
            currency,
            date,
        } => cli::convert::run(amount, &currency, date.as_deref()),
        Commands::Rates { command } => match command {
            RatesCommands::Add {
                date,
                currency,
                rate,
                source,
            } => cli::rates::add(&date, &currency, rate, &source),
            RatesCommands::List { currency, limit } => cli::rates::list(currency.as_deref(), limit),
            RatesCommands::Sync { days } => cli::rates::sync(days),
        },
        Commands::Dashboard { from, to, json } => {
            cli::dashboard::run(from.as_deref(), to.as_deref(), json)
        }
        Commands::Forecast { json } => cli::forecast::run(json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
