use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;

use engine::{Category, Engine, EntryFilter, EntryKind, RemoteService, SyncStatus};

mod settings;

#[derive(Parser, Debug)]
#[command(name = "borsello")]
#[command(about = "Local-first budgeting with optional collaboration")]
struct Cli {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,

    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Budget(Budget),
    Entry(Entry),
    /// Push pending items and pull collaborators' changes.
    Sync(SyncArgs),
    /// Export a budget's entries to CSV.
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct Budget {
    #[command(subcommand)]
    command: BudgetCommand,
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    Create(BudgetCreateArgs),
    List,
    /// Replace the target amount.
    SetAmount(BudgetSetAmountArgs),
    Delete(BudgetDeleteArgs),
    /// Obtain a shareable collaboration code.
    Share(BudgetShareArgs),
    /// Join a shared budget by collaboration code.
    Join(BudgetJoinArgs),
}

#[derive(Args, Debug)]
struct BudgetCreateArgs {
    #[arg(long)]
    name: String,
    /// Target amount, e.g. "1000" or "999.99".
    #[arg(long)]
    amount: String,
    /// Creation date (defaults to today).
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct BudgetSetAmountArgs {
    #[arg(long)]
    id: i64,
    #[arg(long)]
    amount: String,
}

#[derive(Args, Debug)]
struct BudgetDeleteArgs {
    #[arg(long)]
    id: i64,
}

#[derive(Args, Debug)]
struct BudgetShareArgs {
    #[arg(long)]
    id: i64,
}

#[derive(Args, Debug)]
struct BudgetJoinArgs {
    #[arg(long)]
    code: String,
}

#[derive(Args, Debug)]
struct Entry {
    #[command(subcommand)]
    command: EntryCommand,
}

#[derive(Subcommand, Debug)]
enum EntryCommand {
    Add(EntryAddArgs),
    /// List a budget's entries, filtered in memory.
    List(EntryListArgs),
    Delete(EntryDeleteArgs),
}

#[derive(Args, Debug)]
struct EntryAddArgs {
    #[arg(long)]
    budget: i64,
    /// Amount, e.g. "42.50".
    #[arg(long)]
    amount: String,
    #[arg(long, default_value = "")]
    description: String,
    /// "income" or "outcome".
    #[arg(long)]
    kind: String,
    /// e.g. "groceries", "transportation", "other".
    #[arg(long, default_value = "other")]
    category: String,
    /// Entry date (defaults to today).
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Path to an attached invoice file.
    #[arg(long)]
    invoice: Option<String>,
}

#[derive(Args, Debug)]
struct EntryListArgs {
    #[arg(long)]
    budget: i64,
    /// Case-insensitive substring on the description.
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    kind: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Inclusive start date.
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Inclusive end date.
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct EntryDeleteArgs {
    /// Entry ids, comma separated.
    #[arg(long, value_delimiter = ',')]
    ids: Vec<i64>,
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Sync one budget's entries; without it, push all pending budgets.
    #[arg(long)]
    budget: Option<i64>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long)]
    budget: i64,
    /// Output file path.
    #[arg(long, default_value = "entries.csv")]
    out: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "borsello={level},engine={level},client={level}",
            level = settings.app.level
        ))
        .init();

    let db_url = cli
        .database_url
        .unwrap_or_else(|| settings.database.url());
    let db = sea_orm::Database::connect(&db_url).await?;
    Migrator::up(&db, None).await?;

    let remote = client::Client::new(
        &settings.server.base_url,
        &settings.server.username,
        &settings.server.password,
    )?;
    let engine = Engine::builder().database(db).remote(remote).build().await?;

    run(&engine, cli.command).await
}

async fn run<R: RemoteService>(
    engine: &Engine<R>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match command {
        Command::Budget(budget) => match budget.command {
            BudgetCommand::Create(args) => {
                let date = args.date.unwrap_or_else(|| Utc::now().date_naive());
                let budget = engine.create_budget(&args.name, &args.amount, date).await?;
                println!("created budget {} ({})", budget.id, budget.name);
            }
            BudgetCommand::List => {
                for budget in engine.cached_budgets().iter() {
                    println!(
                        "{:>4}  {:<20} target {:>10}  spent {:>10}  {}",
                        budget.id,
                        budget.name,
                        budget.amount.to_string(),
                        budget.total_expenses.to_string(),
                        status_label(engine.budget_status(budget)),
                    );
                }
            }
            BudgetCommand::SetAmount(args) => {
                let budget = engine.update_budget_amount(args.id, &args.amount).await?;
                println!("budget {} target is now {}", budget.id, budget.amount);
            }
            BudgetCommand::Delete(args) => {
                engine.delete_budget(args.id).await?;
                println!("deleted budget {}", args.id);
            }
            BudgetCommand::Share(args) => {
                let code = engine.share_budget(args.id).await?;
                println!("collaboration code: {code}");
            }
            BudgetCommand::Join(args) => {
                let budget = engine.join_collaboration(&args.code).await?;
                println!("joined budget {} ({})", budget.id, budget.name);
            }
        },
        Command::Entry(entry) => match entry.command {
            EntryCommand::Add(args) => {
                let kind = EntryKind::try_from(args.kind.as_str())?;
                let category = Category::try_from(args.category.as_str())?;
                let date = args.date.unwrap_or_else(|| Utc::now().date_naive());
                let entry = engine
                    .create_entry(
                        args.budget,
                        &args.amount,
                        &args.description,
                        kind,
                        category,
                        date,
                        args.invoice,
                    )
                    .await?;
                println!("recorded entry {} ({})", entry.id, entry.amount);
            }
            EntryCommand::List(args) => {
                let filter = EntryFilter {
                    description: args.description,
                    kind: args
                        .kind
                        .as_deref()
                        .map(EntryKind::try_from)
                        .transpose()?,
                    category: args
                        .category
                        .as_deref()
                        .map(Category::try_from)
                        .transpose()?,
                    start_date: args.from,
                    end_date: args.to,
                };
                engine.subscribe_entries(args.budget).await?;
                for entry in engine.filtered_entries(args.budget, &filter) {
                    println!(
                        "{:>4}  {}  {:<7} {:<14} {:>10}  {}  {}",
                        entry.id,
                        entry.date,
                        entry.kind.as_str(),
                        entry.category.as_str(),
                        entry.amount.to_string(),
                        status_label(engine.entry_status(&entry)),
                        entry.description,
                    );
                }
            }
            EntryCommand::Delete(args) => {
                engine.delete_entries_by_ids(&args.ids).await?;
                println!("deleted {} entries", args.ids.len());
            }
        },
        Command::Sync(args) => match args.budget {
            Some(budget_id) => {
                let report = engine.sync_entries(budget_id).await?;
                println!(
                    "pushed {}, pulled {}, conflicts {}, failed {}",
                    report.pushed, report.pulled, report.conflicts, report.failed
                );
            }
            None => {
                let report = engine.sync_budgets().await?;
                println!(
                    "pushed {}, conflicts {}, failed {}",
                    report.pushed, report.conflicts, report.failed
                );
            }
        },
        Command::Export(args) => {
            engine.subscribe_entries(args.budget).await?;
            export_entries(engine, args.budget, &args.out)?;
            println!("exported to {}", args.out);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ExportRow {
    date: String,
    kind: &'static str,
    category: &'static str,
    amount: String,
    description: String,
    synced: bool,
}

fn export_entries<R>(
    engine: &Engine<R>,
    budget_id: i64,
    out: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut writer = csv::Writer::from_path(out)?;
    for entry in engine.cached_entries(budget_id).iter() {
        writer.serialize(ExportRow {
            date: entry.date.to_string(),
            kind: entry.kind.as_str(),
            category: entry.category.as_str(),
            amount: entry.amount.to_string(),
            description: entry.description.clone(),
            synced: entry.is_synced,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::LocalPending => "pending",
        SyncStatus::Syncing => "syncing",
        SyncStatus::Synced => "synced",
        SyncStatus::Conflict => "conflict",
    }
}
