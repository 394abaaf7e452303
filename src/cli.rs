use std::path::PathBuf;

use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use ulid::Ulid;

use crate::model::{BookingStatus, Money, VehicleStatus, VehicleType};

/// More info: <https://docs.rs/clap/latest/clap/_derive/index.html>
#[derive(Debug, Parser)]
#[command(name = "fleetlink")]
#[command(about = "Fleet, booking and calendar desk for vehicle rental operators")]
#[command(version)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalOptions,
}

#[derive(Debug, Args)]
pub struct GlobalOptions {
    #[arg(
        global = true,
        long,
        short = 't',
        help = "Tenant to operate on; wins over FLEETLINK_TENANT and FLEETLINK_HOST"
    )]
    pub tenant: Option<String>,

    #[arg(global = true, long, help = "Print results as JSON")]
    pub json: bool,

    #[arg(
        global = true,
        long,
        help = "Directory holding tenant logs; wins over FLEETLINK_DATA_DIR"
    )]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Manage the fleet")]
    Vehicle {
        #[command(subcommand)]
        command: VehicleCommand,
    },

    #[command(about = "Book a vehicle for an inclusive date range")]
    Book {
        vehicle: Ulid,
        start: NaiveDate,
        end: NaiveDate,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        pickup: Option<String>,
        #[arg(long = "drop")]
        drop_off: Option<String>,
        #[arg(long, default_value_t = 0)]
        discount: Money,
        #[arg(long, default_value_t = 0)]
        deposit: Money,
        #[arg(long, help = "Operator entry: store as Confirmed instead of Pending")]
        confirmed: bool,
    },

    #[command(about = "Move a booking through its lifecycle")]
    Status { id: Ulid, status: BookingStatus },

    #[command(about = "Set a booking's discount and deposit")]
    Payment {
        id: Ulid,
        #[arg(long, default_value_t = 0)]
        discount: Money,
        #[arg(long, default_value_t = 0)]
        deposit: Money,
    },

    #[command(about = "Move a booking to new dates")]
    Reschedule {
        id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[command(about = "Close a vehicle for maintenance or personal use")]
    Block {
        vehicle: Ulid,
        start: NaiveDate,
        end: NaiveDate,
        #[arg(long, default_value = "Maintenance")]
        reason: String,
    },

    #[command(about = "Reopen blocked dates")]
    Unblock { id: Ulid },

    #[command(about = "Check one vehicle, or list the vehicles free for a range")]
    Available {
        start: NaiveDate,
        end: NaiveDate,
        #[arg(long)]
        vehicle: Option<Ulid>,
        #[command(flatten)]
        query: CatalogArgs,
    },

    #[command(about = "Price a rental without booking it")]
    Quote {
        vehicle: Ulid,
        start: NaiveDate,
        end: NaiveDate,
        #[arg(long, default_value_t = 0)]
        discount: Money,
        #[arg(long, default_value_t = 0)]
        deposit: Money,
    },

    #[command(about = "Print a month of bookings as a grid")]
    Calendar {
        #[arg(long, value_parser = parse_month, help = "Month as YYYY-MM; defaults to this month")]
        month: Option<NaiveDate>,
        #[arg(long)]
        vehicle: Option<Ulid>,
        #[arg(long, help = "Leave cancelled bookings out")]
        hide_cancelled: bool,
        #[arg(long, value_parser = parse_weekday, default_value = "sun")]
        week_start: Weekday,
    },

    #[command(about = "List bookings")]
    Bookings {
        #[arg(long)]
        vehicle: Option<Ulid>,
        #[arg(long)]
        status: Option<BookingStatus>,
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },

    #[command(about = "Dashboard numbers for a month")]
    Stats {
        #[arg(long, value_parser = parse_month, help = "Month as YYYY-MM; defaults to this month")]
        month: Option<NaiveDate>,
    },

    #[command(about = "Next bookings starting today or later")]
    Upcoming {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    #[command(about = "Find bookings by customer name or phone")]
    Search { query: String },

    #[command(about = "Show the resolved tenant and its theme")]
    Tenant,

    #[command(about = "Rewrite the tenant's log down to its current state")]
    Compact,

    #[command(about = "Keep the tenant open, compact in the background, serve metrics")]
    Serve,
}

#[derive(Debug, Subcommand)]
pub enum VehicleCommand {
    #[command(about = "Add a vehicle to the fleet")]
    Add {
        make: String,
        model: String,
        plate: String,
        #[arg(long = "type")]
        vehicle_type: VehicleType,
        #[arg(long)]
        rate: Money,
        #[arg(long, default_value_t = 4)]
        seats: u16,
        #[arg(long, default_value_t = VehicleStatus::Active)]
        status: VehicleStatus,
    },

    #[command(about = "List the fleet")]
    List {
        #[command(flatten)]
        query: CatalogArgs,
    },

    #[command(about = "Change a vehicle's details")]
    Update {
        id: Ulid,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        plate: Option<String>,
        #[arg(long = "type")]
        vehicle_type: Option<VehicleType>,
        #[arg(long)]
        rate: Option<Money>,
        #[arg(long)]
        seats: Option<u16>,
        #[arg(long)]
        status: Option<VehicleStatus>,
    },

    #[command(about = "Remove a vehicle with no open bookings")]
    Remove { id: Ulid },
}

/// Catalogue filters shared by `vehicle list` and `available`.
#[derive(Debug, Clone, Default, Args)]
pub struct CatalogArgs {
    #[arg(long = "type")]
    pub vehicle_type: Option<VehicleType>,
    #[arg(long)]
    pub min_rate: Option<Money>,
    #[arg(long)]
    pub max_rate: Option<Money>,
    #[arg(long)]
    pub min_seats: Option<u16>,
}

/// `YYYY-MM` to the first day of that month.
fn parse_month(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM, got `{s}`"))
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.parse::<Weekday>()
        .map_err(|_| format!("expected a weekday such as sun or mon, got `{s}`"))
}
