use crate::personnel::DutyId;
use crate::relief::{ReliefCrew, ReliefOptions};
use crate::time::{format_opt, ServiceMinute};
use crate::timetable::{Timetable, Trip, TripDriver, TripKind, TripLink};
use serde_json::json;
use std::path::Path;

/// Trips worked by one driver duty, in time order. `duty_id` is `None` for
/// the trips nobody was found for.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DutySchedule {
    pub duty_id: Option<DutyId>,
    pub name: Option<String>,
    pub shift_end: Option<ServiceMinute>,
    pub trips: Vec<Trip>,
}

impl Timetable {
    /// Groups trips by driver duty, ordered by each duty's first departure.
    /// Unassigned trips come last.
    pub fn duties(&self) -> Vec<DutySchedule> {
        let mut trips = self.trips.iter().collect::<Vec<_>>();
        trips.sort_by_key(|t| (t.departure, t.line.rank(), t.number));

        let mut groups: Vec<DutySchedule> = Vec::new();
        let mut unassigned = Vec::new();
        for trip in trips {
            match &trip.driver {
                TripDriver::Crew {
                    duty_id,
                    name,
                    shift_end,
                    ..
                } => match groups.iter_mut().find(|g| g.duty_id.as_ref() == Some(duty_id)) {
                    Some(g) => g.trips.push(trip.clone()),
                    None => groups.push(DutySchedule {
                        duty_id: Some(duty_id.clone()),
                        name: Some(name.clone()),
                        shift_end: Some(*shift_end),
                        trips: vec![trip.clone()],
                    }),
                },
                TripDriver::NoDriver | TripDriver::OnCall => unassigned.push(trip.clone()),
            }
        }
        if !unassigned.is_empty() {
            groups.push(DutySchedule {
                duty_id: None,
                name: None,
                shift_end: None,
                trips: unassigned,
            });
        }
        groups
    }
}

fn link_label(link: &TripLink) -> &str {
    match link {
        TripLink::Trip(id) => id,
        TripLink::InService => "in service",
        TripLink::DepartDepot => "depot",
        TripLink::EndOfService => "end",
    }
}

fn driver_label(driver: &TripDriver) -> String {
    match driver {
        TripDriver::Crew { duty_id, name, .. } => format!("{} {}", duty_id, name),
        TripDriver::NoDriver => "NO DRIVER".to_string(),
        TripDriver::OnCall => "on call".to_string(),
    }
}

fn trip_row(trip: &Trip) -> String {
    format!(
        "{:<6} {} {:>3} -> {:<3} {}  unit {:<8} {:<24} [{} | {}]{}",
        trip.id,
        trip.departure,
        trip.origin,
        trip.destination,
        trip.arrival,
        trip.unit,
        driver_label(&trip.driver),
        link_label(&trip.previous),
        link_label(&trip.next),
        if trip.kind == TripKind::DepotReturn {
            "  return to depot"
        } else {
            ""
        }
    )
}

/// Renders the timetable as a departure board per line and as one schedule
/// per driver duty.
pub fn print_plan(timetable: &Timetable) -> (String, String) {
    let mut board = String::new();
    for line in timetable.lines.iter() {
        board.push_str(&format!(
            "{} {}-{}: every {} min, {} min end to end, units {}\n",
            line.line,
            line.origin,
            line.destination,
            line.headway_minutes,
            line.travel_minutes,
            line.units.join(", ")
        ));
        for trip in timetable.trips.iter().filter(|t| t.line == line.line) {
            board.push_str("  ");
            board.push_str(&trip_row(trip));
            board.push('\n');
        }
    }
    let returns = timetable
        .trips
        .iter()
        .filter(|t| t.kind == TripKind::DepotReturn)
        .collect::<Vec<_>>();
    if !returns.is_empty() {
        board.push_str("Depot returns\n");
        for trip in returns {
            board.push_str("  ");
            board.push_str(&trip_row(trip));
            board.push('\n');
        }
    }

    let duties = timetable
        .duties()
        .iter()
        .map(|d| {
            let header = match (&d.duty_id, &d.name, d.shift_end) {
                (Some(id), Some(name), Some(end)) => format!("{} {} (until {})", id, name, end),
                (Some(id), _, _) => id.clone(),
                _ => "Unassigned".to_string(),
            };
            let rows = d
                .trips
                .iter()
                .map(|t| format!("  {}", trip_row(t)))
                .collect::<Vec<_>>();
            format!("{}\n{}", header, rows.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    (board, duties)
}

fn crew_row(crew: &ReliefCrew) -> String {
    format!(
        "{:<8} {:<24} {:<4} until {}",
        crew.shift,
        crew.name.as_deref().unwrap_or("-"),
        crew.service.as_deref().unwrap_or("-"),
        format_opt(crew.shift_end)
    )
}

fn crew_block(out: &mut String, title: &str, rows: Vec<String>) {
    out.push_str(&format!("{} ({})\n", title, rows.len()));
    for row in rows {
        out.push_str("  ");
        out.push_str(&row);
        out.push('\n');
    }
}

/// Renders the crews found for a relief, one block per kind.
pub fn print_relief(relief: &ReliefOptions) -> String {
    let mut out = format!(
        "Relief for {} at {} {} (arrives {}), worked by {}\n",
        relief.circulation,
        relief.station,
        relief.relief_time,
        relief.arrival,
        relief.original_shift.as_deref().unwrap_or("unknown shift")
    );
    crew_block(&mut out, "Passengers", relief.passengers.iter().map(crew_row).collect());
    for (title, adjacent) in [("Previous", &relief.previous), ("Next", &relief.next)] {
        if let Some(adjacent) = adjacent {
            let title = format!("{} {}", title, adjacent.circulation);
            crew_block(&mut out, &title, adjacent.crews.iter().map(crew_row).collect());
        }
    }
    crew_block(
        &mut out,
        "Resting here",
        relief
            .resting
            .iter()
            .map(|m| format!("{}  resting {}-{}", crew_row(&m.crew), m.rest.start, m.rest.end))
            .collect(),
    );
    crew_block(
        &mut out,
        "Extensible",
        relief
            .extensible
            .iter()
            .map(|e| {
                format!(
                    "{}  back {} (+{} min)",
                    crew_row(&e.crew),
                    e.estimated_return,
                    e.extra_minutes
                )
            })
            .collect(),
    );
    crew_block(
        &mut out,
        "Reserves",
        relief
            .reserves
            .iter()
            .map(|r| format!("{}  {} at {}", crew_row(&r.crew), r.reserve.id, r.reserve.station))
            .collect(),
    );
    out
}

pub fn write_plan_json(filename: &Path, timetable: &Timetable) -> std::io::Result<()> {
    std::fs::write(filename, serde_json::to_string_pretty(&plan_json(timetable))?)?;
    Ok(())
}

fn plan_json(timetable: &Timetable) -> serde_json::Value {
    json!({
        "lines": timetable.lines,
        "trips": timetable.trips,
        "duties": timetable.duties(),
    })
}
