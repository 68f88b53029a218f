use crate::allocate::{allocate, IslandInventory, LineAssignment, ShuttleAssignment};
use crate::catalogue::{Catalogue, Circulation};
use crate::config::EngineConfig;
use crate::cutset::CutSet;
use crate::garage::nearest_garage;
use crate::network::{resolve_station_id, Line, Network, StationId, LINE_ORDER};
use crate::pathfind::{estimated_travel_minutes, is_route, shortest_path};
use crate::personnel::DutyId;
use crate::time::ServiceMinute;
use log::*;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    /// Along the line's canonical station order; odd trip numbers.
    Ascending,
    /// Against it; even trip numbers.
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TripKind {
    Service,
    DepotReturn,
}

/// Link from a trip to the previous or next trip worked by the same unit.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TripLink {
    Trip(String),
    InService,
    DepartDepot,
    EndOfService,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TripDriver {
    Crew {
        duty_id: DutyId,
        name: String,
        shift_start: Option<ServiceMinute>,
        shift_end: ServiceMinute,
    },
    /// Nobody in the duty pool could take the trip.
    NoDriver,
    /// Depot return of a unit without a crew on board.
    OnCall,
}

impl TripDriver {
    pub fn duty_id(&self) -> Option<&str> {
        match self {
            TripDriver::Crew { duty_id, .. } => Some(duty_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Trip {
    pub id: String,
    pub number: u32,
    pub line: Line,
    pub unit: String,
    pub driver: TripDriver,
    pub departure: ServiceMinute,
    pub arrival: ServiceMinute,
    pub origin: StationId,
    pub destination: StationId,
    pub direction: Direction,
    pub kind: TripKind,
    pub previous: TripLink,
    pub next: TripLink,
}

/// A crew in the duty pool, with where and when it is next free.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DriverDuty {
    pub duty_id: DutyId,
    pub name: String,
    pub station: StationId,
    pub available_at: ServiceMinute,
    pub shift_start: Option<ServiceMinute>,
    pub shift_end: ServiceMinute,
    pub shift_depot: StationId,
    /// Joined from the shift catalogue rather than the live feed.
    pub future: bool,
}

impl DriverDuty {
    /// Can work a trip arriving at `dest` at `arrival` and still get back to
    /// the depot before the shift ends.
    fn fits_shift(&self, arrival: ServiceMinute, dest: &str, travel: u32) -> bool {
        if arrival > self.shift_end {
            return false;
        }
        dest == self.shift_depot || arrival.plus(travel) <= self.shift_end
    }

    fn as_trip_driver(&self) -> TripDriver {
        TripDriver::Crew {
            duty_id: self.duty_id.clone(),
            name: self.name.clone(),
            shift_start: self.shift_start,
            shift_end: self.shift_end,
        }
    }
}

/// Parameters derived for one shuttle line.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LinePlan {
    pub line: Line,
    pub origin: StationId,
    pub destination: StationId,
    pub travel_minutes: u32,
    pub headway_minutes: u32,
    pub single_track_segments: usize,
    pub horizon: ServiceMinute,
    pub units: Vec<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Timetable {
    pub lines: Vec<LinePlan>,
    pub trips: Vec<Trip>,
    /// Final state of every crew in the pool.
    pub duty_pool: Vec<DriverDuty>,
}

pub struct TimetableRequest<'a> {
    pub inventory: &'a IslandInventory,
    pub assignment: &'a LineAssignment,
    pub reference: ServiceMinute,
    pub cuts: &'a CutSet,
    pub manual_headway: Option<u32>,
}

/// First and last station of the line that lie inside the island.
pub fn line_endpoints(line: Line, inventory: &IslandInventory) -> Option<(StationId, StationId)> {
    let stations = line.stations();
    let present = stations
        .iter()
        .enumerate()
        .filter(|(_, s)| inventory.has(s))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    if present.len() < 2 {
        return None;
    }
    let (lo, hi) = (present[0], present[present.len() - 1]);
    Some((stations[lo].to_string(), stations[hi].to_string()))
}

/// Next ascending (odd) and descending (even) trip numbers, continuing the
/// numbering of the line's circulations that have already departed.
pub fn numbering_baseline(circulations: &[&Circulation], reference: ServiceMinute) -> (u32, u32) {
    let mut max_asc: Option<u32> = None;
    let mut max_desc: Option<u32> = None;
    for c in circulations.iter() {
        let departed = c.departure.map(|d| d <= reference).unwrap_or(false);
        if !departed {
            continue;
        }
        if let Some(n) = c.service_number() {
            let slot = if n % 2 == 1 { &mut max_asc } else { &mut max_desc };
            *slot = Some(slot.map_or(n, |m| m.max(n)));
        }
    }
    (max_asc.map_or(1, |n| n + 2), max_desc.map_or(2, |n| n + 2))
}

/// Latest departure among the line's circulations that touch the island, or
/// the default horizon if that is later.
pub fn service_horizon(
    circulations: &[&Circulation],
    inventory: &IslandInventory,
    reference: ServiceMinute,
    config: &EngineConfig,
) -> ServiceMinute {
    let default = reference.plus(config.service_horizon_minutes);
    circulations
        .iter()
        .filter(|c| c.station_sequence().iter().any(|s| inventory.has(s)))
        .filter_map(|c| c.departure)
        .fold(default, |acc, d| acc.max(d))
}

/// The circulation to take timings from: the last one to have departed that
/// calls at both stations, or failing that the latest one scheduled.
fn timing_sample<'a>(
    circulations: &[&'a Circulation],
    start: &str,
    end: &str,
    reference: ServiceMinute,
) -> Option<&'a Circulation> {
    let mut candidates = circulations
        .iter()
        .copied()
        .filter(|c| {
            let seq = c.station_sequence();
            seq.contains(&start) && seq.contains(&end)
        })
        .collect::<Vec<_>>();
    candidates.sort_by_key(|c| c.departure);
    let departed = candidates
        .iter()
        .rev()
        .find(|c| c.departure.map(|d| d <= reference).unwrap_or(false));
    departed.or_else(|| candidates.last()).copied()
}

#[derive(Debug)]
struct RouteTiming {
    travel: u32,
    single_track_segments: usize,
}

fn route_timing(
    network: &Network,
    config: &EngineConfig,
    circulations: &[&Circulation],
    start: &str,
    end: &str,
    reference: ServiceMinute,
    cuts: &CutSet,
) -> RouteTiming {
    let path = shortest_path(network, start, end, Some(cuts));
    let sampled = timing_sample(circulations, start, end, reference).and_then(|c| {
        let minutes = c.minutes_between(start, end)?;
        trace!("Timing {}-{} from {}: {} min", start, end, c.id, minutes);
        Some(minutes)
    });
    let base = sampled
        .filter(|m| *m > 0)
        .or_else(|| estimated_travel_minutes(&path, config))
        .unwrap_or(config.fallback_travel_minutes);

    let single_track_segments = if is_route(&path) {
        path.windows(2)
            .filter(|w| cuts.is_segment_degraded(&w[0], &w[1]))
            .count()
    } else {
        0
    };

    RouteTiming {
        travel: base + single_track_segments as u32 * config.single_track_penalty_minutes,
        single_track_segments,
    }
}

/// Headway from the cycle time shared among the units running the line.
pub fn compute_headway(
    travel: u32,
    active_on_line: u32,
    single_track: bool,
    config: &EngineConfig,
) -> u32 {
    let cycle = travel * 2 + config.turnaround_buffer_minutes;
    let mut headway = config.min_headway_minutes.max(cycle / active_on_line.max(1));
    if single_track {
        headway = headway.max(config.degraded_min_headway_minutes);
    }
    headway
}

fn seed_duty_pool(
    inventory: &IslandInventory,
    catalogue: &Catalogue,
    reference: ServiceMinute,
    config: &EngineConfig,
) -> Vec<DriverDuty> {
    let mut pool = inventory
        .crews
        .iter()
        .map(|(crew, station)| DriverDuty {
            duty_id: crew.duty_id.clone(),
            name: crew.display_name(),
            station: station.clone(),
            available_at: reference,
            shift_start: crew.shift_start,
            shift_end: crew.shift_end.unwrap_or(config.default_shift_end),
            shift_depot: crew.shift_depot.clone().unwrap_or_else(|| station.clone()),
            future: false,
        })
        .collect::<Vec<_>>();

    let shifts = match (&catalogue.shifts, &catalogue.daily_assignments) {
        (Some(shifts), Some(_)) => shifts,
        _ => {
            warn!("Shift catalogue unavailable, no relief crews will be planned");
            return pool;
        }
    };

    for shift in shifts.iter() {
        let start = match shift.start {
            Some(start) if start >= reference => start,
            _ => continue,
        };
        let depot = match shift.depot.as_ref() {
            Some(depot) if inventory.has(depot) => depot,
            _ => continue,
        };
        if pool.iter().any(|d| d.duty_id == shift.id) {
            continue;
        }
        let assignment = match catalogue.assignment_for(&shift.id) {
            Some(a) => a,
            None => {
                trace!("Shift {} has no crew assigned today", shift.id);
                continue;
            }
        };
        pool.push(DriverDuty {
            duty_id: shift.id.clone(),
            name: format!("{}, {}", assignment.surname, assignment.name),
            station: depot.clone(),
            available_at: start,
            shift_start: Some(start),
            shift_end: shift.end.unwrap_or(config.default_shift_end),
            shift_depot: depot.clone(),
            future: true,
        });
    }
    pool
}

/// The driver bound to the unit if they are free and fit, otherwise anyone
/// free and fit who is standing at the departure station.
fn find_driver(
    pool: &[DriverDuty],
    bound: Option<&str>,
    origin: &str,
    departure: ServiceMinute,
    arrival: ServiceMinute,
    destination: &str,
    travel: u32,
) -> Option<usize> {
    let fits = |d: &DriverDuty| {
        d.available_at <= departure && d.fits_shift(arrival, destination, travel)
    };
    if let Some(bound) = bound {
        if let Some(i) = pool.iter().position(|d| d.duty_id == bound) {
            if fits(&pool[i]) {
                return Some(i);
            }
        }
    }
    pool.iter().position(|d| d.station == origin && fits(d))
}

struct LineUnit<'a> {
    service: &'a ShuttleAssignment,
    driver: Option<DutyId>,
}

/// Builds the shuttle timetable of one island.
pub fn generate(
    network: &Network,
    config: &EngineConfig,
    catalogue: &Catalogue,
    request: &TimetableRequest,
) -> Timetable {
    let reference = request.reference;
    let inventory = request.inventory;
    let all_circulations = match catalogue.circulations.as_ref() {
        Some(c) => c,
        None => {
            warn!("Circulation catalogue unavailable, no timetable generated");
            return Timetable::default();
        }
    };

    let services = allocate(inventory, request.assignment);
    let mut by_line: BTreeMap<Line, Vec<&ShuttleAssignment>> = BTreeMap::new();
    for s in services.iter() {
        by_line.entry(s.line).or_default().push(s);
    }

    let mut pool = seed_duty_pool(inventory, catalogue, reference, config);
    let total_units = inventory.total_units().max(1);
    let active_simultaneous = inventory.total_units().min(inventory.crews.len() as u32);

    let mut lines = Vec::new();
    let mut trips: Vec<Trip> = Vec::new();

    for line in LINE_ORDER.iter().copied() {
        if request.assignment.count(line) == 0 {
            continue;
        }
        let (start, end) = match line_endpoints(line, inventory) {
            Some(eps) => eps,
            None => {
                debug!("{} has fewer than two stations in the island, skipping", line);
                continue;
            }
        };
        let mut units = match by_line.get(&line) {
            Some(u) if !u.is_empty() => u
                .iter()
                .map(|s| LineUnit {
                    service: *s,
                    driver: s.driver.duty_id().map(|d| d.to_string()),
                })
                .collect::<Vec<_>>(),
            _ => {
                debug!("{} has no units allocated, skipping", line);
                continue;
            }
        };

        let circulations = all_circulations
            .iter()
            .filter(|c| c.is_line(line))
            .collect::<Vec<_>>();
        let (mut next_asc_num, mut next_desc_num) = numbering_baseline(&circulations, reference);
        let horizon = service_horizon(&circulations, inventory, reference, config);
        let timing = route_timing(network, config, &circulations, &start, &end, reference, request.cuts);
        let travel = timing.travel;

        let num_units = units.len() as u32;
        let active_on_line = (active_simultaneous * num_units / total_units).max(1);
        let headway = request.manual_headway.filter(|h| *h > 0).unwrap_or_else(|| {
            compute_headway(travel, active_on_line, timing.single_track_segments > 0, config)
        });
        debug!(
            "{} {}-{}: travel {} min, {} single-track segments, headway {} min, {} units, until {}",
            line, start, end, travel, timing.single_track_segments, headway, num_units, horizon
        );

        let mut next_asc = reference.plus(2);
        let mut next_desc = reference.plus(2 + headway / 2);
        let mut step = 0usize;
        while next_asc < horizon || next_desc < horizon {
            let ascending = if step % 2 == 0 {
                next_asc < horizon
            } else {
                next_desc >= horizon
            };
            let departure = if ascending { next_asc } else { next_desc };
            if departure > config.daily_cutoff {
                break;
            }
            let arrival = departure.plus(travel);
            let (origin, destination) = if ascending {
                (&start, &end)
            } else {
                (&end, &start)
            };

            let slot = step % units.len();
            let unit = &mut units[slot];
            let selected = find_driver(
                &pool,
                unit.driver.as_deref(),
                origin,
                departure,
                arrival,
                destination,
                travel,
            );
            let driver = match selected {
                Some(i) => {
                    let duty = &mut pool[i];
                    unit.driver = Some(duty.duty_id.clone());
                    duty.station = destination.clone();
                    duty.available_at = arrival.plus(config.driver_turnaround_minutes);
                    duty.as_trip_driver()
                }
                None => TripDriver::NoDriver,
            };

            let counter = if ascending {
                &mut next_asc_num
            } else {
                &mut next_desc_num
            };
            let number = *counter;
            *counter += 2;
            trips.push(Trip {
                id: format!("{}A{:03}", line.trip_prefix(), number),
                number,
                line,
                unit: unit.service.unit.id.clone(),
                driver,
                departure,
                arrival,
                origin: origin.clone(),
                destination: destination.clone(),
                direction: if ascending {
                    Direction::Ascending
                } else {
                    Direction::Descending
                },
                kind: TripKind::Service,
                previous: TripLink::InService,
                next: TripLink::EndOfService,
            });

            if ascending {
                next_asc = next_asc.plus(headway);
            } else {
                next_desc = next_desc.plus(headway);
            }
            step += 1;
        }

        lines.push(LinePlan {
            line,
            origin: start,
            destination: end,
            travel_minutes: travel,
            headway_minutes: headway,
            single_track_segments: timing.single_track_segments,
            horizon,
            units: units.iter().map(|u| u.service.unit.id.clone()).collect(),
        });
    }

    let surplus = retire_surplus(network, config, inventory, &trips, reference, request.cuts);
    trips.extend(surplus);
    let trips = chain_trips(dedup_trips(trips), inventory);

    info!(
        "Generated {} trips on {} lines with {} crews in the pool",
        trips.len(),
        lines.len(),
        pool.len()
    );
    Timetable {
        lines,
        trips,
        duty_pool: pool,
    }
}

/// Sends every unit without a trip back to the nearest garage.
fn retire_surplus(
    network: &Network,
    config: &EngineConfig,
    inventory: &IslandInventory,
    trips: &[Trip],
    reference: ServiceMinute,
    cuts: &CutSet,
) -> Vec<Trip> {
    let surplus = inventory
        .units
        .iter()
        .filter(|u| !trips.iter().any(|t| t.unit == u.id));
    surplus
        .enumerate()
        .map(|(idx, unit)| {
            let line = unit.line().unwrap_or(Line::S1);
            let number = config.depot_return_first_number + 2 * idx as u32;
            let origin = resolve_station_id(&unit.station);
            let destination = nearest_garage(network, &origin, &inventory.stations, cuts)
                .unwrap_or_else(|| origin.clone());
            let driver = match unit.crew.as_ref() {
                Some(crew) => TripDriver::Crew {
                    duty_id: crew.duty_id.clone(),
                    name: crew.display_name(),
                    shift_start: crew.shift_start,
                    shift_end: crew.shift_end.unwrap_or(config.default_shift_end),
                },
                None => TripDriver::OnCall,
            };
            let departure = reference.plus(config.depot_return_offset_minutes);
            trace!("Retiring surplus unit {} to {}", unit.id, destination);
            Trip {
                id: format!("{}A{:03}", line.trip_prefix(), number),
                number,
                line,
                unit: unit.id.clone(),
                driver,
                departure,
                arrival: departure.plus(config.depot_return_duration_minutes),
                origin,
                destination,
                direction: Direction::Descending,
                kind: TripKind::DepotReturn,
                previous: TripLink::InService,
                next: TripLink::EndOfService,
            }
        })
        .collect()
}

/// Keeps one trip per id. A later trip replaces an earlier one in place.
fn dedup_trips(trips: Vec<Trip>) -> Vec<Trip> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Trip> = Vec::new();
    for trip in trips {
        match index.get(&trip.id) {
            Some(&i) => {
                trace!("Trip {} generated twice, keeping the later one", trip.id);
                unique[i] = trip;
            }
            None => {
                index.insert(trip.id.clone(), unique.len());
                unique.push(trip);
            }
        }
    }
    unique
}

/// Links each unit's trips in time order and sorts the result for display.
fn chain_trips(mut trips: Vec<Trip>, inventory: &IslandInventory) -> Vec<Trip> {
    trips.sort_by_key(|t| t.departure);

    let mut by_unit: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, trip) in trips.iter().enumerate() {
        by_unit.entry(trip.unit.clone()).or_default().push(i);
    }
    for (unit, idxs) in by_unit.iter() {
        let active = inventory
            .units
            .iter()
            .find(|u| &u.id == unit)
            .map(|u| u.is_active())
            .unwrap_or(false);
        for (k, &i) in idxs.iter().enumerate() {
            trips[i].previous = if k == 0 {
                if active {
                    TripLink::InService
                } else {
                    TripLink::DepartDepot
                }
            } else {
                TripLink::Trip(trips[idxs[k - 1]].id.clone())
            };
            trips[i].next = match idxs.get(k + 1) {
                Some(&n) => TripLink::Trip(trips[n].id.clone()),
                None => TripLink::EndOfService,
            };
        }
    }

    trips.sort_by_key(|t| (t.line.rank(), t.departure, t.number));
    trips
}

impl Timetable {
    pub fn trips_of_unit(&self, unit: &str) -> Vec<&Trip> {
        let mut trips = self.trips.iter().filter(|t| t.unit == unit).collect::<Vec<_>>();
        trips.sort_by_key(|t| t.departure);
        trips
    }

    pub fn line(&self, line: Line) -> Option<&LinePlan> {
        self.lines.iter().find(|l| l.line == line)
    }
}
