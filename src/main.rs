use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gearlist::config::Config;
use gearlist::model::*;
use gearlist::source::{MemorySource, PgSource, RecordSource};
use gearlist::Inventory;

#[derive(Parser)]
#[command(name = "gearlist", about = "Inventory tree and availability lookups")]
struct Cli {
    /// Overrides GEARLIST_DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Use a small built-in inventory instead of PostgreSQL.
    #[arg(long)]
    demo: bool,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the category tree.
    Tree,
    /// Print the tree annotated with availability for a date range.
    Available {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Reservation to ignore, e.g. the one being edited.
        #[arg(long)]
        exclude: Option<ReservationId>,
        /// Hide unavailable items.
        #[arg(long)]
        only_free: bool,
    },
    /// Check whether one item is free for a date range.
    Check {
        item_id: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        exclude: Option<ReservationId>,
    },
    /// List items page by page.
    Items {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 50)]
        per_page: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.database_url.clone() {
        config.database_url = url;
    }
    if let Err(e) = gearlist::observability::init(config.metrics_port) {
        tracing::error!("metrics exporter not started: {e}");
    }

    let result = if cli.demo {
        info!("using built-in demo inventory");
        run(Inventory::new(demo_source(), &config), cli.command, cli.json).await
    } else {
        match PgSource::connect(&config.database_url).await {
            Ok(source) => run(Inventory::new(source, &config), cli.command, cli.json).await,
            Err(e) => Err(e.into()),
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run<S: RecordSource>(
    inventory: Inventory<S>,
    command: Command,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Command::Tree => {
            let tree = inventory.get_tree().await?;
            if json {
                print_json(&*tree)?;
            } else {
                print_tree(&tree);
            }
        }
        Command::Available {
            start,
            end,
            exclude,
            only_free,
        } => {
            let mut annotated = inventory
                .get_tree_with_availability(start, end, exclude)
                .await?;
            if only_free {
                annotated.retain_available();
            }
            if json {
                print_json(&annotated)?;
            } else {
                println!(
                    "{}: {} available, {} unavailable",
                    annotated.range, annotated.available_count, annotated.unavailable_count
                );
                print_tree(&annotated.categories);
            }
        }
        Command::Check {
            item_id,
            start,
            end,
            exclude,
        } => {
            let result = inventory
                .check_item_availability(&item_id, start, end, exclude)
                .await?;
            if json {
                print_json(&result)?;
            } else {
                match &result.conflict {
                    None => println!("{item_id} is available {start}..{end}"),
                    Some(r) => println!(
                        "{item_id} is reserved by #{} {} {}",
                        r.reservation_id,
                        r.job_name.as_deref().unwrap_or(""),
                        r.range()
                    ),
                }
            }
            if !result.available {
                return Ok(ExitCode::from(1));
            }
        }
        Command::Items { page, per_page } => {
            let page = inventory.list_items(page, per_page).await?;
            if json {
                print_json(&page)?;
            } else {
                for item in &page.items {
                    println!(
                        "{:<16} {:<16} {}",
                        item.id,
                        item.status,
                        item.serial.as_deref().unwrap_or("-")
                    );
                }
                println!("page {} ({} per page, {} total)", page.page, page.per_page, page.total);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn item_line(indent: usize, item: &TreeItem) {
    let mark = match item.available {
        Some(true) => " [free]".to_string(),
        Some(false) => format!(
            " [reserved #{}]",
            item.conflicting_reservation_id.unwrap_or_default()
        ),
        None => String::new(),
    };
    println!(
        "{:indent$}- {} {} ({}){mark}",
        "",
        item.id,
        item.product_name,
        item.status
    );
}

fn print_tree(tree: &[CategoryNode]) {
    for cat in tree {
        println!("{} ({})", cat.name, cat.item_count);
        cat.items.iter().for_each(|i| item_line(2, i));
        for sub in &cat.subcategories {
            println!("  {} ({})", sub.name, sub.item_count);
            sub.items.iter().for_each(|i| item_line(4, i));
            for ss in &sub.subsubcategories {
                println!("    {} ({})", ss.name, ss.item_count);
                ss.items.iter().for_each(|i| item_line(6, i));
            }
        }
    }
}

fn demo_source() -> MemorySource {
    let src = MemorySource::new();
    src.insert_category(Category { id: 1, name: "Audio".into() });
    src.insert_category(Category { id: 2, name: "Video".into() });
    src.insert_subcategory(Subcategory {
        id: 10,
        name: "Mixers".into(),
        category_id: Some(1),
    });
    src.insert_subsubcategory(SubSubcategory {
        id: 100,
        name: "Digital".into(),
        subcategory_id: Some(10),
    });
    let products = [
        (1, "Digital desk", 120.0, 1, Some(10), Some(100)),
        (2, "Handheld mic", 8.0, 1, None, None),
        (3, "Cinema camera", 250.0, 2, None, None),
    ];
    for (id, name, daily_price, cat, sub, subsub) in products {
        src.insert_product(Product {
            id,
            name: name.into(),
            daily_price,
            category_id: Some(cat),
            subcategory_id: sub,
            subsubcategory_id: subsub,
        });
    }
    for (id, product) in [("MIX-001", 1), ("MIC-001", 2), ("MIC-002", 2), ("CAM-001", 3)] {
        src.insert_item(Item {
            id: id.into(),
            status: ItemStatus::Free,
            serial: None,
            product_id: Some(product),
        });
    }
    if let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(2024, 6, 1),
        NaiveDate::from_ymd_opt(2024, 6, 10),
    ) {
        src.insert_reservation(Reservation {
            item_id: "CAM-001".into(),
            reservation_id: 42,
            job_name: Some("Festival".into()),
            start: Some(start),
            end: Some(end),
        });
    }
    src
}
