//! voltlog - battery lifecycle ledger
//!
//! This is the command-line entry point. It wires together:
//! - Configuration loading
//! - Store initialization
//! - The battery service and data exchange
//! - One subcommand per ledger operation

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use voltlog_api::{
    format_color, parse_color, Battery, BatteryStatus, BatteryType, Category, EventImpact,
    ExportFormat, HistoryEntry, NewBattery, NewCategory, DEFAULT_CATEGORY_ICON,
};
use voltlog_config::{load_config_or_default, Settings};
use voltlog_core::{
    decode, fleet_alerts, matches_query, AlertKind, BatteryIdentity, BatteryService,
    BatteryStatistics, DataExchange, LedgerSummary,
};
use voltlog_store::{SqliteStore, Store};
use voltlog_util::{
    database_path, default_config_path, format_datetime_full, BatteryId, CategoryId,
};

/// voltlog - Track rechargeable battery packs and their history
#[derive(Parser, Debug)]
#[command(name = "voltlog", version)]
#[command(about = "Lifecycle ledger for rechargeable battery packs", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/voltlog/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set VOLTLOG_DATA_DIR env var)
    #[arg(short, long, env = "VOLTLOG_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence; default from config)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a battery (starts CHARGED with zero cycles)
    Add {
        #[arg(long)]
        brand: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        serial: String,
        /// LIPO, LI_ION, NIMH, LIFE or OTHER
        #[arg(long = "type")]
        battery_type: BatteryType,
        #[arg(long)]
        cells: u32,
        /// Capacity in mAh
        #[arg(long)]
        capacity: u32,
        /// Purchase date, YYYY-MM-DD (default: today)
        #[arg(long)]
        purchased: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List batteries ordered by brand and model
    List {
        #[arg(long)]
        status: Option<BatteryStatus>,
        /// Case-insensitive match on brand, model or serial number
        #[arg(long)]
        search: Option<String>,
        /// Only batteries in this category
        #[arg(long)]
        category: Option<CategoryId>,
    },

    /// Show one battery with its full history
    Show { id: BatteryId },

    /// Record a status change
    Status {
        id: BatteryId,
        status: BatteryStatus,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Record a voltage reading
    Voltage {
        id: BatteryId,
        #[arg(allow_negative_numbers = true)]
        volts: f64,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Add a note
    Note { id: BatteryId, text: String },

    /// Log maintenance
    Maintain { id: BatteryId, text: String },

    /// Count a completed charge cycle
    Cycle {
        id: BatteryId,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Delete a battery and its history
    Delete { id: BatteryId },

    /// Recent activity across the fleet, or one battery's ledger
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        battery: Option<BatteryId>,
    },

    /// Fleet statistics
    Stats {
        /// Health bucket threshold (default from config)
        #[arg(long)]
        max_cycles: Option<u32>,
    },

    /// Alerts, most urgent first
    Alerts {
        /// Hide an alert, as ID:KIND (e.g. 3:low_health); may repeat
        #[arg(long = "dismiss", value_parser = parse_dismissal)]
        dismissed: Vec<(BatteryId, AlertKind)>,
    },

    /// Manage categories and battery membership
    Category {
        #[command(subcommand)]
        action: CategoryCommand,
    },

    /// Encode or decode label tokens
    Label {
        #[command(subcommand)]
        action: LabelCommand,
    },

    /// Export the fleet as JSON or CSV
    Export {
        #[arg(long)]
        format: Option<ExportFormat>,
        /// Include history (JSON only)
        #[arg(long, overrides_with = "no_history")]
        history: bool,
        #[arg(long)]
        no_history: bool,
        /// Output file or directory (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Import batteries from a JSON or CSV file
    Import {
        file: PathBuf,
        /// Defaults to the file extension
        #[arg(long)]
        format: Option<ExportFormat>,
        /// Delete the current fleet first
        #[arg(long)]
        replace: bool,
    },

    /// Print the matching batteries on every change until interrupted
    Watch {
        #[arg(long)]
        status: Option<BatteryStatus>,
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    /// List categories with their battery counts
    List,
    /// Create a category
    Add {
        name: String,
        /// #RRGGBB (default: next palette color)
        #[arg(long, value_parser = parse_color)]
        color: Option<u32>,
        #[arg(long, default_value = DEFAULT_CATEGORY_ICON)]
        icon: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Change a category; omitted fields keep their value
    Edit {
        id: CategoryId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_color)]
        color: Option<u32>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a category (its batteries are kept)
    Delete { id: CategoryId },
    /// List the batteries in a category
    Show { id: CategoryId },
    /// Add a battery to a category
    Assign {
        battery: BatteryId,
        category: CategoryId,
    },
    /// Remove a battery from a category
    Unassign {
        battery: BatteryId,
        category: CategoryId,
    },
    /// Replace every category of a battery (none clears them)
    Set {
        battery: BatteryId,
        categories: Vec<CategoryId>,
    },
}

#[derive(Subcommand, Debug)]
enum LabelCommand {
    /// Print the token for a battery
    Encode { id: BatteryId },
    /// Parse a scanned token and look the battery up
    Decode { token: String },
}

fn parse_dismissal(s: &str) -> Result<(BatteryId, AlertKind), String> {
    let (id, kind) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ID:KIND, got '{}'", s))?;
    let id = id.trim().parse().map_err(|e| format!("bad battery id: {}", e))?;
    let kind = kind.parse().map_err(|e| format!("{}", e))?;
    Ok((id, kind))
}

/// Wired-up application state
struct App {
    settings: Settings,
    service: BatteryService,
}

impl App {
    fn new(args: &Args, settings: Settings) -> Result<Self> {
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = database_path(&data_dir);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        debug!(db_path = %db_path.display(), "Store initialized");

        Ok(Self {
            settings,
            service: BatteryService::new(store),
        })
    }

    async fn run(self, command: Command) -> Result<()> {
        match command {
            Command::Add {
                brand,
                model,
                serial,
                battery_type,
                cells,
                capacity,
                purchased,
                notes,
            } => {
                let battery = self
                    .service
                    .create(NewBattery {
                        brand,
                        model,
                        serial_number: serial,
                        battery_type,
                        cells,
                        capacity,
                        purchase_date: purchased.unwrap_or_else(voltlog_util::today),
                        notes,
                    })
                    .await?;

                let others = self.service.list(None).await?;
                if others
                    .iter()
                    .any(|b| b.id != battery.id && b.serial_number == battery.serial_number)
                {
                    warn!(serial = %battery.serial_number, "Serial number already used by another battery");
                }
                println!("Added {} ({})", battery.short_label(), battery.display_name());
            }

            Command::List {
                status,
                search,
                category,
            } => {
                let batteries = match (&search, category) {
                    (_, Some(category)) => self.service.batteries_in_category(category).await?,
                    (Some(query), None) => self.service.find(query).await?,
                    (None, None) => self.service.list(status).await?,
                };
                let query = search.unwrap_or_default();
                let batteries: Vec<Battery> = batteries
                    .into_iter()
                    .filter(|b| status.is_none_or(|s| b.status == s) && matches_query(b, &query))
                    .collect();
                print_batteries(&batteries);
            }

            Command::Show { id } => {
                let battery = self.require(id).await?;
                self.print_detail(&battery).await?;
            }

            Command::Status { id, status, notes } => {
                match self.service.update_status(id, status, &notes).await? {
                    Some(entry) => println!("{}", entry.description()),
                    None => eprintln!("Battery {} not found; nothing recorded", id),
                }
            }

            Command::Voltage { id, volts, notes } => {
                let entry = self.service.record_voltage(id, volts, &notes).await?;
                println!("{}", entry.description());
            }

            Command::Note { id, text } => {
                let entry = self.service.add_note(id, &text).await?;
                println!("{}", entry.description());
            }

            Command::Maintain { id, text } => {
                let entry = self.service.record_maintenance(id, &text).await?;
                println!("{}", entry.description());
            }

            Command::Cycle { id, notes } => {
                let entry = self.service.complete_cycle(id, &notes).await?;
                println!("{}", entry.description());
            }

            Command::Delete { id } => {
                if self.service.delete(id).await? {
                    println!("Deleted battery {}", id);
                } else {
                    println!("Battery {} was already gone", id);
                }
            }

            Command::History { limit, battery } => {
                let entries = match battery {
                    Some(id) => self.service.history(id).await?,
                    None => self.service.recent_history(limit).await?,
                };
                for entry in &entries {
                    print_entry(entry);
                }
            }

            Command::Stats { max_cycles } => {
                let max_cycles = max_cycles.unwrap_or(self.settings.health.max_cycles);
                if max_cycles == 0 {
                    bail!("--max-cycles must be greater than zero");
                }
                let batteries = self.service.list(None).await?;
                print_statistics(&BatteryStatistics::compute(&batteries, max_cycles), max_cycles);
            }

            Command::Alerts { dismissed } => {
                let batteries = self.service.list(None).await?;
                let history = self.service.all_history().await?;
                let dismissed: HashSet<_> = dismissed.into_iter().collect();

                let alerts = fleet_alerts(
                    &batteries,
                    &history,
                    voltlog_util::today(),
                    &self.settings.alerts,
                    &dismissed,
                );
                if alerts.is_empty() {
                    println!("No alerts");
                }
                for alert in &alerts {
                    println!(
                        "[{:<8}] {:<16} {}  {}",
                        alert.priority,
                        alert.kind,
                        voltlog_api::short_label(alert.battery_id),
                        alert.message
                    );
                }
            }

            Command::Category { action } => self.run_category(action).await?,

            Command::Label { action } => match action {
                LabelCommand::Encode { id } => {
                    let battery = self.require(id).await?;
                    let token = BatteryIdentity::from(&battery)
                        .encode()
                        .context("Battery cannot be encoded as a label")?;
                    println!("{}", token);
                    println!("{}  {}", battery.short_label(), battery.display_name());
                }
                LabelCommand::Decode { token } => {
                    let identity = decode(&token).context("Invalid label")?;
                    match self.service.get_by_id(identity.battery_id).await? {
                        Some(battery) if BatteryIdentity::from(&battery) == identity => {
                            self.print_detail(&battery).await?;
                        }
                        Some(battery) => {
                            println!(
                                "Label {} no longer matches {} ({} {} [{}])",
                                identity.battery_id,
                                battery.short_label(),
                                battery.brand,
                                battery.model,
                                battery.serial_number
                            );
                        }
                        None => match self.service.get_by_serial(&identity.serial_number).await? {
                            Some(battery) => {
                                println!(
                                    "Label id {} is unknown; serial {} belongs to {}",
                                    identity.battery_id,
                                    identity.serial_number,
                                    battery.short_label()
                                );
                            }
                            None => bail!(
                                "No battery matches {} {} [{}]",
                                identity.brand,
                                identity.model,
                                identity.serial_number
                            ),
                        },
                    }
                }
            },

            Command::Export {
                format,
                history,
                no_history,
                out,
            } => {
                let format = format.unwrap_or(self.settings.export.format);
                let include_history = if history {
                    true
                } else if no_history {
                    false
                } else {
                    self.settings.export.include_history
                };

                let exchange = DataExchange::new(self.service.clone());
                let result = exchange.export(format, include_history).await?;

                match out {
                    Some(path) => {
                        let path = if path.is_dir() {
                            path.join(&result.file_name)
                        } else {
                            path
                        };
                        std::fs::write(&path, &result.content)
                            .with_context(|| format!("Failed to write {:?}", path))?;
                        println!(
                            "Exported {} batteries to {}",
                            result.battery_count,
                            path.display()
                        );
                    }
                    None => print!("{}", result.content),
                }
            }

            Command::Import {
                file,
                format,
                replace,
            } => {
                let format = match format.or_else(|| ExportFormat::from_path(&file)) {
                    Some(format) => format,
                    None => bail!("Cannot infer format of {:?}; pass --format", file),
                };
                let content = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {:?}", file))?;

                let exchange = DataExchange::new(self.service.clone());
                let summary = exchange
                    .import(&content, format, replace)
                    .await
                    .with_context(|| format!("Import of {:?} failed", file))?;

                println!(
                    "Imported {} of {} batteries ({} skipped)",
                    summary.imported_count, summary.total_in_file, summary.skipped_count
                );
            }

            Command::Watch { status, search } => {
                let mut live = match &search {
                    Some(query) => self.service.search(query).await?,
                    None => self.service.filter_by_status(status).await?,
                };
                let keep = |b: &Battery| status.is_none_or(|s| b.status == s);

                print_snapshot(&live.current(), keep);
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            info!("Interrupted, stopping watch");
                            break;
                        }
                        snapshot = live.changed() => match snapshot {
                            Some(snapshot) => print_snapshot(&snapshot, keep),
                            None => break,
                        },
                    }
                }
                live.cancel();
            }
        }

        Ok(())
    }

    async fn run_category(&self, action: CategoryCommand) -> Result<()> {
        match action {
            CategoryCommand::List => {
                let categories = self.service.list_categories().await?;
                if categories.is_empty() {
                    println!("No categories");
                }
                for c in &categories {
                    println!(
                        "#{:<4} {:<24} {}  {:<10} {:>3} batteries  {}",
                        c.id,
                        c.name,
                        format_color(c.color),
                        c.icon,
                        c.battery_count,
                        c.description
                    );
                }
            }

            CategoryCommand::Add {
                name,
                color,
                icon,
                description,
            } => {
                let category = self
                    .service
                    .create_category(NewCategory {
                        name,
                        color,
                        icon,
                        description,
                    })
                    .await?;
                println!(
                    "Created category {} ({}, {})",
                    category.id,
                    category.name,
                    format_color(category.color)
                );
            }

            CategoryCommand::Edit {
                id,
                name,
                color,
                icon,
                description,
            } => {
                let Some(current) = self.service.get_category(id).await? else {
                    bail!("Category {} not found", id);
                };
                let updated = self
                    .service
                    .update_category(
                        id,
                        NewCategory {
                            name: name.unwrap_or(current.name),
                            color,
                            icon: icon.unwrap_or(current.icon),
                            description: description.unwrap_or(current.description),
                        },
                    )
                    .await?;
                println!("Updated category {} ({})", updated.id, updated.name);
            }

            CategoryCommand::Delete { id } => {
                if self.service.delete_category(id).await? {
                    println!("Deleted category {}", id);
                } else {
                    println!("Category {} was already gone", id);
                }
            }

            CategoryCommand::Show { id } => {
                let Some(category) = self.service.get_category(id).await? else {
                    bail!("Category {} not found", id);
                };
                println!("{}  {}", category.name, format_color(category.color));
                if !category.description.is_empty() {
                    println!("  {}", category.description);
                }
                print_batteries(&self.service.batteries_in_category(id).await?);
            }

            CategoryCommand::Assign { battery, category } => {
                if self.service.assign_category(battery, category).await? {
                    println!("Added battery {} to category {}", battery, category);
                } else {
                    println!("Battery {} is already in category {}", battery, category);
                }
            }

            CategoryCommand::Unassign { battery, category } => {
                if self.service.unassign_category(battery, category).await? {
                    println!("Removed battery {} from category {}", battery, category);
                } else {
                    println!("Battery {} was not in category {}", battery, category);
                }
            }

            CategoryCommand::Set {
                battery,
                categories,
            } => {
                let count = categories.len();
                self.service
                    .set_battery_categories(battery, categories)
                    .await?;
                println!("Battery {} now belongs to {} categories", battery, count);
            }
        }
        Ok(())
    }

    async fn print_detail(&self, battery: &Battery) -> Result<()> {
        let history = self.service.history(battery.id).await?;
        let categories = self.service.battery_categories(battery.id).await?;
        print_battery_detail(battery, &history, &categories);
        Ok(())
    }

    async fn require(&self, id: BatteryId) -> Result<Battery> {
        match self.service.get_by_id(id).await? {
            Some(battery) => Ok(battery),
            None => bail!("Battery {} not found", id),
        }
    }
}

fn print_snapshot(batteries: &[Battery], keep: impl Fn(&Battery) -> bool) {
    let filtered: Vec<Battery> = batteries.iter().filter(|b| keep(b)).cloned().collect();
    println!("--- {} ---", format_datetime_full(&voltlog_util::now()));
    print_batteries(&filtered);
}

fn print_batteries(batteries: &[Battery]) {
    if batteries.is_empty() {
        println!("No batteries");
        return;
    }
    let today = voltlog_util::today();
    for b in batteries {
        println!(
            "{}  #{:<4} {:<28} {:<16} {:<8} {:<14} {:>4} cycles  {:>3}%",
            b.short_label(),
            b.id,
            b.display_name(),
            b.serial_number,
            b.battery_type,
            b.status,
            b.cycle_count,
            b.health_percentage(today)
        );
    }
}

fn print_battery_detail(battery: &Battery, history: &[HistoryEntry], categories: &[Category]) {
    let today = voltlog_util::today();
    println!("{}  {}", battery.short_label(), battery.display_name());
    println!("  Id:        {}", battery.id);
    println!("  Serial:    {}", battery.serial_number);
    println!(
        "  Type:      {} ({}S, {} mAh)",
        battery.battery_type, battery.cells, battery.capacity
    );
    println!(
        "  Purchased: {} ({} days ago)",
        battery.purchase_date,
        battery.age_in_days(today)
    );
    println!("  Status:    {}", battery.status);
    println!("  Cycles:    {}", battery.cycle_count);
    println!("  Health:    {}%", battery.health_percentage(today));
    if !battery.notes.is_empty() {
        println!("  Notes:     {}", battery.notes);
    }
    if !categories.is_empty() {
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        println!("  Groups:    {}", names.join(", "));
    }

    let summary = LedgerSummary::from_entries(history);
    if let Some(voltage) = summary.latest_voltage {
        println!("  Voltage:   {:.2}V (average {:.2}V)", voltage, summary.average_voltage.unwrap_or(voltage));
    }
    if let Some(at) = summary.last_maintenance {
        println!("  Serviced:  {}", format_datetime_full(&at));
    }

    println!();
    println!("History ({} entries):", summary.entry_count);
    for entry in history {
        print_entry(entry);
    }
}

fn print_entry(entry: &HistoryEntry) {
    let marker = match entry.impact() {
        EventImpact::Positive => '+',
        EventImpact::Neutral => ' ',
        EventImpact::Negative => '-',
    };
    let notes = if entry.notes.is_empty() {
        String::new()
    } else {
        format!("  ({})", entry.notes)
    };
    println!(
        "  {} {}  {}  {}{}",
        marker,
        format_datetime_full(&entry.timestamp),
        voltlog_api::short_label(entry.battery_id),
        entry.description(),
        notes
    );
}

fn print_statistics(stats: &BatteryStatistics, max_cycles: u32) {
    println!("Batteries: {}", stats.total_count);
    for status in BatteryStatus::ALL {
        println!(
            "  {:<14} {:>4}  ({:.0}%)",
            status,
            stats.count_for(status),
            stats.percentage(status)
        );
    }
    println!("Average cycles: {:.1}", stats.average_cycle_count);

    println!("Health (max {} cycles):", max_cycles);
    println!("  healthy  {}", stats.health.healthy);
    println!("  warning  {}", stats.health.warning);
    println!("  critical {}", stats.health.critical);

    if !stats.cycles_by_brand.is_empty() {
        println!("Average cycles by brand:");
        for (brand, cycles) in &stats.cycles_by_brand {
            println!("  {:<20} {:.1}", brand, cycles);
        }
        println!("Average cycles by type:");
        for (battery_type, cycles) in &stats.cycles_by_type {
            println!("  {:<20} {:.1}", battery_type, cycles);
        }
    }

    if let Some(oldest) = &stats.oldest_battery {
        println!(
            "Oldest:    {} {} (purchased {})",
            oldest.short_label(),
            oldest.display_name(),
            oldest.purchase_date
        );
    }
    if let Some(most_used) = &stats.most_used_battery {
        println!(
            "Most used: {} {} ({} cycles)",
            most_used.short_label(),
            most_used.display_name(),
            most_used.cycle_count
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging; stdout is reserved for command output
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| settings.service.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %args.config.display(),
        "voltlog starting"
    );

    let app = App::new(&args, settings)?;
    app.run(args.command).await
}
