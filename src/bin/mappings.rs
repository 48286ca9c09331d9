use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gcnrec::services::mapping::{AddOutcome, IdMappings, MappingStore};

/// Operator tool for the identifier mapping store. Runs offline between
/// harvesting/training runs and a live-service reload; every mutation
/// writes a backup of the prior blob before overwriting.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the mapping blob
    #[arg(short, long, default_value = "./models/id_mappings.json")]
    mapping_path: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add one user identifier at the given index
    Add {
        user_id: String,
        #[arg(default_value_t = 0)]
        index: usize,
    },
    /// Add many user identifiers with wrap-around index assignment
    AddBulk {
        user_ids: Vec<String>,
        #[arg(short, long, default_value_t = 0)]
        start_index: usize,
    },
    /// Check whether a user identifier is mapped
    Check { user_id: String },
    /// Show mapping counts and index range
    Info,
    /// List externally-issued user identifiers
    List,
    /// Build a fresh mapping from newline-separated identifier files
    Generate {
        #[arg(long)]
        users_file: String,
        #[arg(long)]
        items_file: String,
    },
}

fn read_id_file(path: &str) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading identifier file {}", path))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn main() -> Result<()> {
    let args = Args::parse();
    std::env::set_var("RUST_LOG", &args.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match args.command {
        Command::Add { user_id, index } => {
            let mut store = MappingStore::load(&args.mapping_path)?;
            match store.mappings.add_user(&user_id, index) {
                AddOutcome::Added { index } => {
                    store.save()?;
                    println!("Added: {} -> index {}", user_id, index);
                }
                AddOutcome::AlreadyExists { index } => {
                    println!("User {} already exists -> index {}", user_id, index);
                }
            }
        }
        Command::AddBulk {
            user_ids,
            start_index,
        } => {
            let mut store = MappingStore::load(&args.mapping_path)?;
            let report = store.mappings.add_users_bulk(&user_ids, start_index);
            store.save()?;
            for (user_id, index) in &report.added {
                println!("Added: {} -> index {}", user_id, index);
            }
            for user_id in &report.skipped {
                println!("Skipped (exists): {}", user_id);
            }
            if report.collisions > 0 {
                println!(
                    "Warning: {} identifier(s) share an index with an existing user",
                    report.collisions
                );
            }
        }
        Command::Check { user_id } => {
            let store = MappingStore::load(&args.mapping_path)?;
            match store.mappings.resolve_user(&user_id) {
                Some(index) => println!("Found: {} -> index {}", user_id, index),
                None => {
                    println!("Not found: {}", user_id);
                    println!("Hint: run 'gcnrec-mappings add {}' to add this user", user_id);
                }
            }
        }
        Command::Info => {
            let store = MappingStore::load(&args.mapping_path)?;
            let info = store.mappings.info();
            println!("==================================================");
            println!("ID MAPPINGS INFO");
            println!("==================================================");
            println!("Total users: {}", info.total_users);
            println!("Total items: {}", info.total_items);
            match info.max_user_index {
                Some(max) => println!("User index range: 0 - {}", max),
                None => println!("User index range: empty"),
            }
            println!("External users added: {}", info.external_users);
            for (user_id, index) in &info.sample_external_users {
                println!("  {} -> index {}", user_id, index);
            }
            if info.external_users > info.sample_external_users.len() {
                println!(
                    "  ... and {} more",
                    info.external_users - info.sample_external_users.len()
                );
            }
        }
        Command::List => {
            let store = MappingStore::load(&args.mapping_path)?;
            let external = store.mappings.list_external_users();
            if external.is_empty() {
                println!("No external users found in mappings");
            } else {
                println!("External users ({}):", external.len());
                for (user_id, index) in external {
                    println!("  {} -> index {}", user_id, index);
                }
            }
        }
        Command::Generate {
            users_file,
            items_file,
        } => {
            let users = read_id_file(&users_file)?;
            let items = read_id_file(&items_file)?;
            let mappings = IdMappings::from_identifiers(users, items);
            let info = mappings.info();
            let store = MappingStore::create(&args.mapping_path, mappings);
            store.save()?;
            println!(
                "Generated mapping with {} users, {} items -> {}",
                info.total_users, info.total_items, args.mapping_path
            );
        }
    }

    Ok(())
}
