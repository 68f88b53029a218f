use crate::catalogue::{Catalogue, Circulation, DutyLeg, Shift};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::network::{resolve_station_id, StationId};
use crate::time::ServiceMinute;
use log::*;

/// A reserve crew post: the crews on duty `id` wait at `station` between
/// `start` and `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ReserveWindow {
    pub id: &'static str,
    pub station: &'static str,
    pub start: ServiceMinute,
    pub end: ServiceMinute,
}

const fn hm(hours: u32, minutes: u32) -> ServiceMinute {
    ServiceMinute(hours * 60 + minutes)
}

#[rustfmt::skip]
pub const RESERVES: &[ReserveWindow] = &[
    ReserveWindow { id: "QRS1", station: "SR", start: hm(6, 0), end: hm(14, 0) },
    ReserveWindow { id: "QRS2", station: "SR", start: hm(14, 0), end: hm(22, 0) },
    ReserveWindow { id: "QRS0", station: "SR", start: hm(22, 0), end: hm(6, 0) },
    ReserveWindow { id: "QRP0", station: "PC", start: hm(22, 0), end: hm(6, 0) },
    ReserveWindow { id: "QRN0", station: "NA", start: hm(22, 0), end: hm(6, 0) },
    ReserveWindow { id: "QRF0", station: "PN", start: hm(22, 0), end: hm(6, 0) },
    ReserveWindow { id: "QRR0", station: "RB", start: hm(22, 0), end: hm(6, 0) },
    ReserveWindow { id: "QRR4", station: "RB", start: hm(21, 50), end: hm(5, 50) },
    ReserveWindow { id: "QRR1", station: "RB", start: hm(6, 0), end: hm(14, 0) },
    ReserveWindow { id: "QRR2", station: "RB", start: hm(14, 0), end: hm(22, 0) },
];

/// Stations covered by the Rubí reserve.
const S1_ZONE: &[&str] = &["MS", "HG", "RB", "FN", "TR", "VP", "EN", "NA"];
/// Stations covered by the Sarrià and Parc del Nord reserves.
const S2_ZONE: &[&str] = &["VO", "SJ", "BT", "UN", "SQ", "CF", "PJ", "CT", "NO", "PN"];

impl ReserveWindow {
    /// A window whose start is later than its end runs past midnight.
    pub fn is_active(&self, t: ServiceMinute) -> bool {
        if self.start > self.end {
            t >= self.start || t < self.end
        } else {
            t >= self.start && t < self.end
        }
    }

    pub fn covers(&self, station: &str) -> bool {
        if S1_ZONE.contains(&station) {
            self.station == "RB"
        } else if S2_ZONE.contains(&station) {
            self.station == "SR" || self.station == "PN"
        } else {
            self.station == station
        }
    }
}

/// The first reserve post on duty at `t` that covers `station`.
pub fn reserve_for(station: &str, t: ServiceMinute) -> Option<&'static ReserveWindow> {
    RESERVES.iter().find(|r| r.is_active(t) && r.covers(station))
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum SegmentKind {
    /// Waiting between legs. The location is unknown when neither the legs
    /// nor the shift name it.
    Rest { location: Option<StationId> },
    Leg { code: String },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DutySegment {
    pub start: ServiceMinute,
    pub end: ServiceMinute,
    pub kind: SegmentKind,
}

/// A leg with the gaps filled from the circulation it works or rides.
struct ResolvedLeg {
    code: String,
    departure: Option<ServiceMinute>,
    arrival: Option<ServiceMinute>,
    from: Option<StationId>,
    to: Option<StationId>,
}

fn resolve_leg(leg: &DutyLeg, catalogue: &Catalogue) -> ResolvedLeg {
    let circulation = catalogue.circulation(leg.passenger_on.as_deref().unwrap_or(&leg.code));
    ResolvedLeg {
        code: leg.code.clone(),
        departure: leg.departure.or_else(|| circulation.and_then(|c| c.departure)),
        arrival: leg.arrival.or_else(|| circulation.and_then(|c| c.arrival)),
        from: leg.from.clone().or_else(|| circulation.map(|c| c.origin.clone())),
        to: leg.to.clone().or_else(|| circulation.map(|c| c.destination.clone())),
    }
}

/// Splits a shift into worked legs and the rests between them, from shift
/// start to shift end. Legs without times are left out.
pub fn duty_segments(shift: &Shift, catalogue: &Catalogue) -> Vec<DutySegment> {
    let (start, end) = match (shift.start, shift.end) {
        (Some(s), Some(e)) => (s, e),
        _ => return Vec::new(),
    };
    let legs = shift
        .legs
        .iter()
        .map(|l| resolve_leg(l, catalogue))
        .collect::<Vec<_>>();

    let mut segments = Vec::new();
    let mut position = start;
    for (i, leg) in legs.iter().enumerate() {
        let (departure, arrival) = match (leg.departure, leg.arrival) {
            (Some(d), Some(a)) => (d, a),
            _ => continue,
        };
        if departure > position {
            let location = if i == 0 {
                leg.from.clone().or_else(|| shift.depot.clone())
            } else {
                legs[i - 1].to.clone()
            };
            segments.push(DutySegment {
                start: position,
                end: departure,
                kind: SegmentKind::Rest { location },
            });
        }
        segments.push(DutySegment {
            start: departure,
            end: arrival,
            kind: SegmentKind::Leg {
                code: leg.code.clone(),
            },
        });
        position = position.max(arrival);
    }
    if position < end {
        let location = match legs.last() {
            Some(leg) => leg.to.clone(),
            None => shift.depot.clone(),
        };
        segments.push(DutySegment {
            start: position,
            end,
            kind: SegmentKind::Rest { location },
        });
    }
    segments
}

/// When a crew can take over `circulation` at `station`: its departure at
/// the origin, the stop time further on, or its arrival otherwise.
pub fn relief_time(circulation: &Circulation, station: &str) -> Option<ServiceMinute> {
    if circulation.origin == station {
        return circulation.departure;
    }
    circulation
        .stops
        .iter()
        .find(|s| s.station == station)
        .and_then(|s| s.time)
        .or(circulation.arrival)
}

/// The circulations running just before and just after `circulation` on the
/// same line towards the same terminus.
fn adjacent_circulations<'a>(
    catalogue: &'a Catalogue,
    circulation: &Circulation,
) -> (Option<&'a Circulation>, Option<&'a Circulation>) {
    let mut same_route = catalogue
        .circulations
        .iter()
        .flatten()
        .filter(|c| c.line == circulation.line && c.destination == circulation.destination)
        .collect::<Vec<_>>();
    same_route.sort_by_key(|c| c.departure.unwrap_or(ServiceMinute(0)));
    match same_route.iter().position(|c| c.id == circulation.id) {
        Some(i) => (
            i.checked_sub(1).map(|p| same_route[p]),
            same_route.get(i + 1).copied(),
        ),
        None => (None, None),
    }
}

pub struct ReliefRequest<'a> {
    pub circulation: &'a str,
    /// Where the relief takes place. Defaults to the circulation's origin.
    pub station: Option<&'a str>,
    /// Only consider shifts of this service.
    pub service: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReliefCrew {
    pub shift: String,
    pub name: Option<String>,
    pub service: Option<String>,
    pub shift_end: Option<ServiceMinute>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AdjacentCrews {
    pub circulation: String,
    pub crews: Vec<ReliefCrew>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RestingMatch {
    pub crew: ReliefCrew,
    pub rest: DutySegment,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Extension {
    pub crew: ReliefCrew,
    pub estimated_return: ServiceMinute,
    /// Minutes worked past the scheduled shift end.
    pub extra_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReserveMatch {
    pub crew: ReliefCrew,
    pub reserve: ReserveWindow,
}

/// Crews that could take over a circulation, by kind of availability.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReliefOptions {
    pub circulation: String,
    pub station: StationId,
    pub relief_time: ServiceMinute,
    pub arrival: ServiceMinute,
    /// Shift that works the circulation.
    pub original_shift: Option<String>,
    /// Crews riding the circulation as passengers.
    pub passengers: Vec<ReliefCrew>,
    pub previous: Option<AdjacentCrews>,
    pub next: Option<AdjacentCrews>,
    pub resting: Vec<RestingMatch>,
    pub extensible: Vec<Extension>,
    pub reserves: Vec<ReserveMatch>,
}

fn relief_crew(shift: &Shift, catalogue: &Catalogue) -> ReliefCrew {
    ReliefCrew {
        shift: shift.id.clone(),
        name: catalogue.assignment_for(&shift.id).map(|a| {
            if a.surname.is_empty() {
                a.name.clone()
            } else {
                format!("{}, {}", a.surname, a.name)
            }
        }),
        service: shift.service.clone(),
        shift_end: shift.end,
    }
}

fn rides(shift: &Shift, circulation: &str) -> bool {
    shift
        .legs
        .iter()
        .any(|l| l.passenger_on.as_deref() == Some(circulation))
}

/// Searches the shift catalogue for crews able to relieve the driver of a
/// circulation.
pub fn find_relief(
    catalogue: &Catalogue,
    config: &EngineConfig,
    request: &ReliefRequest,
) -> Result<ReliefOptions> {
    let circulation = catalogue
        .circulation(request.circulation)
        .ok_or_else(|| Error::UnknownCirculation(request.circulation.to_string()))?;
    let station = request
        .station
        .map(resolve_station_id)
        .unwrap_or_else(|| circulation.origin.clone());
    let no_time = || Error::NoReliefTime {
        circulation: circulation.id.clone(),
        station: station.clone(),
    };
    let relief = relief_time(circulation, &station).ok_or_else(no_time)?;
    let arrival = circulation.arrival.ok_or_else(no_time)?;
    let back = arrival.plus(config.relief_return_minutes);
    debug!(
        "Relief for {} at {} {}, arriving {}",
        circulation.id, station, relief, arrival
    );

    let empty = Vec::new();
    let all_shifts = match catalogue.shifts.as_ref() {
        Some(s) => s,
        None => {
            warn!("Shift catalogue unavailable, no relief crews can be found");
            &empty
        }
    };
    let original_shift = all_shifts
        .iter()
        .find(|s| s.legs.iter().any(|l| l.code == circulation.id))
        .map(|s| s.id.clone());
    let shifts = all_shifts
        .iter()
        .filter(|s| match request.service {
            Some(service) => s.service.as_deref() == Some(service),
            None => true,
        })
        .collect::<Vec<_>>();

    let riding = |id: &str| {
        shifts
            .iter()
            .filter(|s| rides(s, id))
            .map(|s| relief_crew(s, catalogue))
            .collect::<Vec<_>>()
    };
    let adjacent = |c: Option<&Circulation>| {
        c.map(|c| AdjacentCrews {
            circulation: c.id.clone(),
            crews: riding(&c.id),
        })
    };
    let (before, after) = adjacent_circulations(catalogue, circulation);

    let reserve = reserve_for(&station, relief);
    let tolerance = config.rest_tolerance_minutes;
    let mut resting = Vec::new();
    let mut extensible = Vec::new();
    let mut reserves = Vec::new();
    for shift in shifts.iter().filter(|s| Some(&s.id) != original_shift.as_ref()) {
        let segments = duty_segments(shift, catalogue);
        let rest = segments.iter().find(|seg| {
            matches!(&seg.kind, SegmentKind::Rest { location: Some(l) } if *l == station)
                && seg.start.minutes() <= relief.minutes() + tolerance
                && seg.end.minutes() + tolerance >= relief.minutes()
        });

        if let Some(rest) = rest {
            resting.push(RestingMatch {
                crew: relief_crew(shift, catalogue),
                rest: rest.clone(),
            });

            let worked = shift.duration.unwrap_or_else(|| match (shift.start, shift.end) {
                (Some(s), Some(e)) => e.elapsed_since(s),
                _ => 0,
            });
            let busy = segments.iter().any(|seg| {
                matches!(seg.kind, SegmentKind::Leg { .. }) && seg.start >= relief && seg.start < back
            });
            if worked < config.max_shift_minutes && !busy {
                if let Some(end) = shift.end {
                    let extra = back.elapsed_since(end);
                    if worked + extra <= config.max_shift_minutes {
                        extensible.push(Extension {
                            crew: relief_crew(shift, catalogue),
                            estimated_return: back,
                            extra_minutes: extra,
                        });
                    }
                }
            }
        }

        if let Some(r) = reserve.filter(|r| shift.id.contains(r.id)) {
            reserves.push(ReserveMatch {
                crew: relief_crew(shift, catalogue),
                reserve: *r,
            });
        }
    }

    info!(
        "Relief for {}: {} resting, {} extensible, {} reserves",
        circulation.id,
        resting.len(),
        extensible.len(),
        reserves.len()
    );
    Ok(ReliefOptions {
        circulation: circulation.id.clone(),
        station,
        relief_time: relief,
        arrival,
        original_shift,
        passengers: riding(&circulation.id),
        previous: adjacent(before),
        next: adjacent(after),
        resting,
        extensible,
        reserves,
    })
}
