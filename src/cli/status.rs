use crate::db::get_connection;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:      {}", settings.data_dir);
    println!("Database:      {}", db_path.display());
    println!("Base currency: {}", settings.base_currency());

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

        let expenses = count("SELECT count(*) FROM expenses")?;
        let review = count("SELECT count(*) FROM expenses WHERE status = 'needs_review'")?;
        let approved = count("SELECT count(*) FROM expenses WHERE status = 'approved'")?;
        let unconverted = count(
            "SELECT count(*) FROM expenses WHERE amount_original IS NOT NULL AND amount_base IS NULL",
        )?;
        let rates = count("SELECT count(*) FROM fx_rates")?;

        println!();
        println!("Expenses:      {expenses}");
        println!("Needs review:  {review}");
        println!("Approved:      {approved}");
        println!("Unconverted:   {unconverted}");
        println!("FX rates:      {rates}");
    } else {
        println!();
        println!("Database not found. Run `clerk init` to set up.");
    }

    Ok(())
}
