//! Runs console commands against one tenant's engine and renders the result
//! as plain text or JSON.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Weekday};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use ulid::Ulid;

use crate::cli::{CatalogArgs, Command, VehicleCommand};
use crate::config::TenantConfig;
use crate::desk::Desk;
use crate::engine::calendar::{self, CalendarFilter, CalendarMonth, DEFAULT_PREVIEW};
use crate::engine::stats::DashboardStats;
use crate::engine::{Conflict, Engine, EngineError, NewBooking};
use crate::model::*;
use crate::observability;
use crate::repository::{BookingFilter, VehicleQuery};

#[derive(Debug)]
pub enum ConsoleError {
    Engine(EngineError),
    Json(serde_json::Error),
    Usage(String),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Engine(e) => write!(f, "{e}"),
            ConsoleError::Json(e) => write!(f, "JSON output failed: {e}"),
            ConsoleError::Usage(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ConsoleError {}

impl From<EngineError> for ConsoleError {
    fn from(e: EngineError) -> Self {
        ConsoleError::Engine(e)
    }
}

impl From<RangeError> for ConsoleError {
    fn from(e: RangeError) -> Self {
        ConsoleError::Engine(e.into())
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Json(e)
    }
}

impl From<CatalogArgs> for VehicleQuery {
    fn from(args: CatalogArgs) -> Self {
        Self {
            vehicle_type: args.vehicle_type,
            min_rate: args.min_rate,
            max_rate: args.max_rate,
            min_seats: args.min_seats,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text { color: bool },
    Json,
}

pub struct Console {
    engine: Arc<Engine>,
    desk: Desk<Engine>,
    tenant: TenantConfig,
    format: OutputFormat,
    today: NaiveDate,
}

impl Console {
    pub fn new(
        engine: Arc<Engine>,
        tenant: TenantConfig,
        format: OutputFormat,
        today: NaiveDate,
    ) -> Self {
        Self {
            desk: Desk::new(engine.clone()),
            engine,
            tenant,
            format,
            today,
        }
    }

    /// Run one command and return what to print.
    pub async fn execute(&self, command: Command) -> Result<String, ConsoleError> {
        let label = observability::command_label(&command);
        let start = Instant::now();
        let result = self.dispatch(command).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::COMMAND_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        debug!("{label}: {status} in {:?}", start.elapsed());
        result
    }

    fn emit<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce(&T) -> String,
    ) -> Result<String, ConsoleError> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Text { .. } => Ok(text(value)),
        }
    }

    async fn dispatch(&self, command: Command) -> Result<String, ConsoleError> {
        match command {
            Command::Vehicle { command } => self.vehicle(command).await,

            Command::Book {
                vehicle,
                start,
                end,
                name,
                phone,
                pickup,
                drop_off,
                discount,
                deposit,
                confirmed,
            } => {
                let request = NewBooking {
                    id: Ulid::new(),
                    vehicle_id: vehicle,
                    range: DateRange::new(start, end)?,
                    customer: Customer { name, phone },
                    pickup_location: pickup,
                    drop_location: drop_off,
                    discount,
                    deposit,
                };
                let initial = if confirmed {
                    BookingStatus::Confirmed
                } else {
                    BookingStatus::Pending
                };
                let booking = self.engine.create_booking(request, initial).await?;
                self.emit(&booking, booking_detail)
            }

            Command::Status { id, status } => {
                let booking = self.engine.set_status(id, status).await?;
                self.emit(&booking, booking_detail)
            }

            Command::Payment {
                id,
                discount,
                deposit,
            } => {
                let booking = self.engine.update_payment(id, discount, deposit).await?;
                self.emit(&booking, booking_detail)
            }

            Command::Reschedule { id, start, end } => {
                let booking = self
                    .engine
                    .reschedule(id, DateRange::new(start, end)?)
                    .await?;
                self.emit(&booking, booking_detail)
            }

            Command::Block {
                vehicle,
                start,
                end,
                reason,
            } => {
                let block = self
                    .engine
                    .block_dates(Ulid::new(), vehicle, DateRange::new(start, end)?, reason)
                    .await?;
                self.emit(&block, |b| {
                    format!("{}  blocked {}  {}", b.id, b.range, b.reason)
                })
            }

            Command::Unblock { id } => {
                let vehicle_id = self.engine.unblock(id).await?;
                self.emit(&json!({ "unblocked": id, "vehicle_id": vehicle_id }), |_| {
                    format!("{id} removed")
                })
            }

            Command::Available {
                start,
                end,
                vehicle,
                query,
            } => {
                let range = DateRange::new(start, end)?;
                match vehicle {
                    Some(vehicle_id) => {
                        let conflict = self.engine.check_availability(vehicle_id, range).await?;
                        let report = json!({
                            "vehicle_id": vehicle_id,
                            "range": range,
                            "available": conflict.is_none(),
                            "conflict": conflict,
                        });
                        self.emit(&report, |_| match conflict {
                            None => format!("available {range}"),
                            Some(Conflict::Booking(id)) => format!("taken {range}: booking {id}"),
                            Some(Conflict::Block(id)) => format!("taken {range}: blocked by {id}"),
                        })
                    }
                    None => {
                        let free = self
                            .desk
                            .available_vehicles(range, &query.into())
                            .await;
                        self.emit(&free, |vs| vehicle_table(vs))
                    }
                }
            }

            Command::Quote {
                vehicle,
                start,
                end,
                discount,
                deposit,
            } => {
                let range = DateRange::new(start, end)?;
                let quote = self.desk.quote(vehicle, range, discount, deposit).await?;
                self.emit(&quote, quote_detail)
            }

            Command::Calendar {
                month,
                vehicle,
                hide_cancelled,
                week_start,
            } => {
                let filter = CalendarFilter {
                    vehicle_id: vehicle,
                    excluded: if hide_cancelled {
                        vec![BookingStatus::Cancelled]
                    } else {
                        Vec::new()
                    },
                    week_start,
                };
                let anchor = month.unwrap_or(self.today);
                let bookings = self.desk.calendar_bookings(anchor, &filter).await;
                let cal = calendar::build(anchor, &bookings, &filter);
                metrics::counter!(observability::CALENDAR_BUILDS_TOTAL).increment(1);

                match self.format {
                    OutputFormat::Json => Ok(serde_json::to_string_pretty(&calendar_json(&cal))?),
                    OutputFormat::Text { color } => {
                        let vehicles: HashMap<Ulid, Vehicle> = self
                            .engine
                            .list_vehicles()
                            .await
                            .into_iter()
                            .map(|v| (v.id, v))
                            .collect();
                        Ok(render_calendar(&cal, &vehicles, week_start, color))
                    }
                }
            }

            Command::Bookings {
                vehicle,
                status,
                from,
                to,
            } => {
                let window = match (from, to) {
                    (Some(from), Some(to)) => Some(DateRange::new(from, to)?),
                    _ => None,
                };
                let filter = BookingFilter {
                    vehicle_id: vehicle,
                    status,
                    window,
                    search: None,
                };
                let bookings = self.engine.list_bookings(&filter).await;
                self.emit(&bookings, |bs| booking_table(bs))
            }

            Command::Stats { month } => {
                let stats = self
                    .desk
                    .dashboard(month.unwrap_or(self.today), self.today)
                    .await;
                self.emit(&stats, stats_detail)
            }

            Command::Upcoming { limit } => {
                let next = self.desk.upcoming(self.today, limit).await;
                self.emit(&next, |bs| booking_table(bs))
            }

            Command::Search { query } => {
                let filter = BookingFilter {
                    search: Some(query),
                    ..BookingFilter::default()
                };
                let found = self.engine.list_bookings(&filter).await;
                self.emit(&found, |bs| booking_table(bs))
            }

            Command::Tenant => {
                let t = &self.tenant;
                let report = json!({
                    "tenant_id": t.tenant_id,
                    "primary_color": t.primary_color.to_string(),
                    "primary_hsl": t.primary_color.hsl_css(),
                    "domain": t.domain,
                });
                self.emit(&report, |_| {
                    format!(
                        "tenant   {}\ncolor    {} ({})\ndomain   {}",
                        t.tenant_id,
                        t.primary_color,
                        t.primary_color.hsl_css(),
                        t.domain.as_deref().unwrap_or("-")
                    )
                })
            }

            Command::Compact => {
                self.engine.compact_wal().await?;
                self.emit(&json!({ "compacted": true }), |_| "compacted".to_string())
            }

            Command::Serve => Err(ConsoleError::Usage(
                "`serve` keeps running; start it from the binary, not the console".into(),
            )),
        }
    }

    async fn vehicle(&self, command: VehicleCommand) -> Result<String, ConsoleError> {
        match command {
            VehicleCommand::Add {
                make,
                model,
                plate,
                vehicle_type,
                rate,
                seats,
                status,
            } => {
                let vehicle = Vehicle {
                    id: Ulid::new(),
                    make,
                    model,
                    plate,
                    vehicle_type,
                    status,
                    seats,
                    daily_rate: rate,
                };
                self.engine.add_vehicle(vehicle.clone()).await?;
                self.emit(&vehicle, vehicle_line)
            }

            VehicleCommand::List { query } => {
                let query = VehicleQuery::from(query);
                let vehicles: Vec<Vehicle> = self
                    .engine
                    .list_vehicles()
                    .await
                    .into_iter()
                    .filter(|v| query.matches(v))
                    .collect();
                self.emit(&vehicles, |vs| vehicle_table(vs))
            }

            VehicleCommand::Update {
                id,
                make,
                model,
                plate,
                vehicle_type,
                rate,
                seats,
                status,
            } => {
                let mut vehicle = self.engine.get_vehicle(id).await?;
                let before = vehicle.clone();
                if let Some(make) = make {
                    vehicle.make = make;
                }
                if let Some(model) = model {
                    vehicle.model = model;
                }
                if let Some(plate) = plate {
                    vehicle.plate = plate;
                }
                if let Some(t) = vehicle_type {
                    vehicle.vehicle_type = t;
                }
                if let Some(rate) = rate {
                    vehicle.daily_rate = rate;
                }
                if let Some(seats) = seats {
                    vehicle.seats = seats;
                }
                if let Some(status) = status {
                    vehicle.status = status;
                }
                if vehicle == before {
                    return Err(ConsoleError::Usage("nothing to update".into()));
                }
                self.engine.update_vehicle(vehicle.clone()).await?;
                self.emit(&vehicle, vehicle_line)
            }

            VehicleCommand::Remove { id } => {
                self.engine.remove_vehicle(id).await?;
                self.emit(&json!({ "removed": id }), |_| format!("{id} removed"))
            }
        }
    }
}

// ── Text output ──────────────────────────────────────────────────

/// Minor units as a decimal amount: 450000 → "4500.00".
pub fn money(amount: Money) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn vehicle_line(v: &Vehicle) -> String {
    format!(
        "{}  {:<6} {} {} ({})  {} seats  {}/day  {}",
        v.id,
        v.vehicle_type,
        v.make,
        v.model,
        v.plate,
        v.seats,
        money(v.daily_rate),
        v.status
    )
}

fn vehicle_table(vehicles: &[Vehicle]) -> String {
    if vehicles.is_empty() {
        return "no vehicles".to_string();
    }
    vehicles.iter().map(vehicle_line).collect::<Vec<_>>().join("\n")
}

fn booking_line(b: &Booking) -> String {
    let payment = b.payment_status().map_or("-", PaymentStatus::as_str);
    format!(
        "{}  {}  {:<9}  {} ({})  {}  {}",
        b.id,
        b.range,
        b.status,
        b.customer.name,
        b.customer.phone,
        money(b.total()),
        payment
    )
}

fn booking_table(bookings: &[Booking]) -> String {
    if bookings.is_empty() {
        return "no bookings".to_string();
    }
    bookings.iter().map(booking_line).collect::<Vec<_>>().join("\n")
}

fn booking_detail(b: &Booking) -> String {
    let mut out = booking_line(b);
    if let Some(pickup) = &b.pickup_location {
        let _ = write!(out, "\n  pickup  {pickup}");
    }
    if let Some(drop) = &b.drop_location {
        let _ = write!(out, "\n  drop    {drop}");
    }
    if let Some(q) = &b.quote {
        let _ = write!(out, "\n{}", quote_detail(q));
    }
    out
}

fn quote_detail(q: &Quote) -> String {
    format!(
        "  {} days x {}  = {}\n  discount  {}\n  total     {}\n  deposit   {}\n  remaining {}  ({})",
        q.days(),
        money(q.daily_rate()),
        money(q.subtotal()),
        money(q.discount()),
        money(q.total()),
        money(q.deposit()),
        money(q.remaining()),
        q.payment_status()
    )
}

fn stats_detail(s: &DashboardStats) -> String {
    format!(
        "vehicles     {}\nactive       {}\npending      {}\nrevenue      {}\nutilization  {}%",
        s.total_vehicles,
        s.active_bookings,
        s.pending_requests,
        money(s.monthly_revenue),
        s.utilization_percent
    )
}

// ── Calendar ─────────────────────────────────────────────────────

const CELL_WIDTH: usize = 14;

fn tone_marker(tone: StatusTone) -> char {
    match tone {
        StatusTone::Warning => '?',
        StatusTone::Info => '+',
        StatusTone::Success => '>',
        StatusTone::Muted => '=',
        StatusTone::Danger => 'x',
    }
}

fn fit(text: &str) -> String {
    let clipped: String = text.chars().take(CELL_WIDTH - 1).collect();
    format!("{clipped:<width$}", width = CELL_WIDTH)
}

fn day_label(date: NaiveDate, in_month: bool, color: bool) -> String {
    let day = date.format("%-d").to_string();
    match (in_month, color) {
        (true, _) => fit(&day),
        (false, true) => format!("\x1b[2m{}\x1b[0m", fit(&day)),
        (false, false) => fit(&format!("({day})")),
    }
}

fn entry_label(b: &Booking, show_name: bool, vehicles: &HashMap<Ulid, Vehicle>) -> String {
    let code = vehicles.get(&b.vehicle_id).map_or_else(|| "---".to_string(), Vehicle::code);
    let marker = tone_marker(b.status.tone());
    if show_name {
        let first = b.customer.name.split_whitespace().next().unwrap_or("");
        fit(&format!("{marker}{code} {first}"))
    } else {
        fit(&format!("{marker}{code}"))
    }
}

/// Month grid as text: a weekday header, then per week a row of day
/// numbers, up to [`DEFAULT_PREVIEW`] bookings per cell and a "+N more"
/// line. Days outside the month are dimmed, or bracketed without color.
pub fn render_calendar(
    cal: &CalendarMonth<'_>,
    vehicles: &HashMap<Ulid, Vehicle>,
    week_start: Weekday,
    color: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", cal.month.start().format("%B %Y"));

    let mut day = week_start;
    for _ in 0..7 {
        out.push_str(&fit(&day.to_string()));
        day = day.succ();
    }
    push_line_end(&mut out);

    for week in cal.weeks() {
        out.push_str(&"-".repeat(CELL_WIDTH * 7));
        out.push('\n');
        for cell in week {
            out.push_str(&day_label(cell.date, cell.in_current_month, color));
        }
        push_line_end(&mut out);

        let previews: Vec<_> = week.iter().map(|c| c.preview(DEFAULT_PREVIEW)).collect();
        let rows = previews.iter().map(|(shown, _)| shown.len()).max().unwrap_or(0);
        for row in 0..rows {
            for (cell, (shown, _)) in week.iter().zip(&previews) {
                match shown.get(row) {
                    Some(b) => out.push_str(&entry_label(b, cell.shows_name(b, week_start), vehicles)),
                    None => out.push_str(&fit("")),
                }
            }
            push_line_end(&mut out);
        }

        if previews.iter().any(|(_, hidden)| *hidden > 0) {
            for (_, hidden) in &previews {
                match *hidden {
                    0 => out.push_str(&fit("")),
                    n => out.push_str(&fit(&format!("+{n} more"))),
                }
            }
            push_line_end(&mut out);
        }
    }
    out.trim_end().to_string()
}

fn push_line_end(out: &mut String) {
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    out.push('\n');
}

fn calendar_json(cal: &CalendarMonth<'_>) -> serde_json::Value {
    let weeks: Vec<serde_json::Value> = cal
        .weeks()
        .map(|week| {
            week.iter()
                .map(|cell| {
                    json!({
                        "date": cell.date,
                        "in_current_month": cell.in_current_month,
                        "bookings": cell.bookings.iter().map(|b| b.id).collect::<Vec<_>>(),
                    })
                })
                .collect()
        })
        .collect();
    json!({ "month": cal.month, "grid": cal.grid, "weeks": weeks })
}
