use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use reggie_core::id::MAX_WORKER_ID;
use reggie_core::password::{hash_password, DEFAULT_PASSWORD};
use reggie_core::status::ENABLED;
use reggie_core::{Audit, Employee, IdGenerator};
use reggie_server::{Database, RepositoryError};
use std::path::{Path, PathBuf};

/// Reggie: operator tools for the takeout backend
#[derive(Parser, Debug)]
#[command(name = "reggie")]
#[command(about = "Operator tools for the Reggie takeout backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database, or bring its schema up to date
    InitDb(InitDbArgs),
    /// Add a back-office employee account
    CreateEmployee(CreateEmployeeArgs),
    /// Print the stored digest of a password
    HashPassword(HashPasswordArgs),
}

#[derive(Parser, Debug)]
struct InitDbArgs {
    /// SQLite database file
    #[arg(long, default_value = "reggie.db")]
    database: PathBuf,
}

#[derive(Parser, Debug)]
struct CreateEmployeeArgs {
    /// SQLite database file
    #[arg(long, default_value = "reggie.db")]
    database: PathBuf,

    /// Login name
    #[arg(long)]
    username: String,

    /// Display name
    #[arg(long)]
    name: String,

    #[arg(long)]
    phone: String,

    /// "1" for male, "0" for female
    #[arg(long, default_value = "1", value_parser = ["0", "1"])]
    sex: String,

    /// National id number
    #[arg(long)]
    id_number: String,

    /// Initial password (defaults to 123456)
    #[arg(long)]
    password: Option<String>,

    /// Id generator worker; must differ from the WORKER_ID of any running
    /// server
    #[arg(long, default_value_t = MAX_WORKER_ID)]
    worker_id: u16,
}

#[derive(Parser, Debug)]
struct HashPasswordArgs {
    /// Plain-text password
    plain: String,
}

fn open(database: &Path, worker_id: u16) -> Result<Database> {
    let ids = IdGenerator::new(worker_id).context("Invalid --worker-id")?;
    Database::open(database, ids)
        .with_context(|| format!("Failed to open database {}", database.display()))
}

async fn run_init_db(args: InitDbArgs) -> Result<()> {
    let db = open(&args.database, MAX_WORKER_ID)?;
    let employees = db.count_employees().await?;
    println!(
        "Database {} is ready ({} employees)",
        args.database.display(),
        employees
    );
    Ok(())
}

async fn run_create_employee(args: CreateEmployeeArgs) -> Result<Employee> {
    let db = open(&args.database, args.worker_id)?;
    let audit = Audit::system();
    let password = args.password.as_deref().unwrap_or(DEFAULT_PASSWORD);
    let employee = Employee {
        id: db.next_id(),
        username: args.username,
        name: args.name,
        password: hash_password(password),
        phone: args.phone,
        sex: args.sex,
        id_number: args.id_number,
        status: ENABLED,
        create_time: audit.at,
        update_time: audit.at,
        create_user: None,
        update_user: None,
    };

    match db.insert_employee(employee.clone()).await {
        Ok(()) => Ok(employee),
        Err(RepositoryError::Duplicate(_)) => Err(anyhow!(
            "Username {} already exists",
            employee.username
        )),
        Err(e) => Err(e).context("Failed to create employee"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb(args) => run_init_db(args).await,
        Commands::CreateEmployee(args) => {
            let employee = run_create_employee(args).await?;
            println!("Created employee {} ({})", employee.username, employee.id);
            Ok(())
        }
        Commands::HashPassword(args) => {
            println!("{}", hash_password(&args.plain));
            Ok(())
        }
    }
}
