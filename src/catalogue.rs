use crate::cutset::CutSet;
use crate::error::Result;
use crate::network::{resolve_station_id, short_duty_id, Line, StationId};
use crate::personnel::Personnel;
use crate::time::{deserialize_opt_time, ServiceMinute};
use log::*;
use std::path::Path;

/// Rows as stored by the external timetable and rostering store. Text and
/// time fields accept `null` or a value of the wrong type.
pub mod raw {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Circulation {
        pub id: String,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub linia: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub inici: Option<String>,
        #[serde(default, rename = "final", deserialize_with = "crate::time::deserialize_opt_text")]
        pub final_: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub sortida: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub arribada: Option<String>,
        #[serde(default)]
        pub estacions: Option<Vec<StationStop>>,
    }

    #[derive(Deserialize, Debug, Clone)]
    pub struct StationStop {
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub nom: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub hora: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub sortida: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub arribada: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub via: Option<String>,
    }

    #[derive(Deserialize, Debug, Clone)]
    pub struct Shift {
        pub id: String,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub servei: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub inici_torn: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub final_torn: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub duracio: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub dependencia: Option<String>,
        #[serde(default)]
        pub circulations: Option<Vec<ShiftLeg>>,
    }

    /// A shift's circulation entry: either a bare code or a detailed record.
    #[derive(Deserialize, Debug, Clone)]
    #[serde(untagged)]
    pub enum ShiftLeg {
        Code(String),
        Detail(ShiftLegDetail),
    }

    #[derive(Deserialize, Debug, Clone)]
    pub struct ShiftLegDetail {
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub codi: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub observacions: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub sortida: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub arribada: Option<String>,
        #[serde(default, alias = "machinistInici", deserialize_with = "crate::time::deserialize_opt_text")]
        pub inici: Option<String>,
        #[serde(default, rename = "final", alias = "machinistFinal", deserialize_with = "crate::time::deserialize_opt_text")]
        pub final_: Option<String>,
    }

    #[derive(Deserialize, Debug, Clone)]
    pub struct DailyAssignment {
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub torn: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub nom: Option<String>,
        #[serde(default, deserialize_with = "crate::time::deserialize_opt_text")]
        pub cognoms: Option<String>,
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stop {
    pub station: StationId,
    pub time: Option<ServiceMinute>,
    pub track: Option<String>,
}

/// A historical (scheduled) circulation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Circulation {
    pub id: String,
    pub line: String,
    pub origin: StationId,
    pub destination: StationId,
    pub departure: Option<ServiceMinute>,
    pub arrival: Option<ServiceMinute>,
    pub stops: Vec<Stop>,
}

impl Circulation {
    /// Origin, intermediate stops and destination.
    pub fn station_sequence(&self) -> Vec<&str> {
        velcro::vec![
            self.origin.as_str(),
            ..self.stops.iter().map(|s| s.station.as_str()),
            self.destination.as_str()
        ]
    }

    /// Times aligned with [`Circulation::station_sequence`].
    pub fn time_sequence(&self) -> Vec<Option<ServiceMinute>> {
        velcro::vec![self.departure, ..self.stops.iter().map(|s| s.time), self.arrival]
    }

    pub fn is_line(&self, line: Line) -> bool {
        Line::from_code(&self.line) == Some(line)
    }

    /// Numeric part of the id, when it is a regular two or three digit
    /// service number starting with `0` or `1`.
    pub fn service_number(&self) -> Option<u32> {
        let digits = self
            .id
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>();
        if !(2..=3).contains(&digits.len()) || !(digits.starts_with('0') || digits.starts_with('1')) {
            return None;
        }
        digits.parse().ok()
    }

    /// Elapsed minutes between two stations of this circulation.
    pub fn minutes_between(&self, a: &str, b: &str) -> Option<u32> {
        let stations = self.station_sequence();
        let times = self.time_sequence();
        let i1 = stations.iter().position(|s| *s == a)?;
        let i2 = stations.iter().position(|s| *s == b)?;
        let (t1, t2) = (times[i1]?, times[i2]?);
        Some(if t2 >= t1 { t2.elapsed_since(t1) } else { t1.elapsed_since(t2) })
    }
}

/// One entry of a shift's working sequence. Legs ridden as a passenger
/// carry the circulation they ride on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DutyLeg {
    pub code: String,
    pub passenger_on: Option<String>,
    pub from: Option<StationId>,
    pub to: Option<StationId>,
    pub departure: Option<ServiceMinute>,
    pub arrival: Option<ServiceMinute>,
}

impl DutyLeg {
    pub fn code(code: &str) -> DutyLeg {
        DutyLeg {
            code: code.trim().to_uppercase(),
            passenger_on: None,
            from: None,
            to: None,
            departure: None,
            arrival: None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Shift {
    pub id: String,
    pub service: Option<String>,
    pub start: Option<ServiceMinute>,
    pub end: Option<ServiceMinute>,
    /// Scheduled working minutes.
    pub duration: Option<u32>,
    pub depot: Option<StationId>,
    pub legs: Vec<DutyLeg>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DailyAssignment {
    pub duty_id: String,
    pub name: String,
    pub surname: String,
}

/// Data from the external store. A `None` table could not be fetched.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    pub circulations: Option<Vec<Circulation>>,
    pub shifts: Option<Vec<Shift>>,
    pub daily_assignments: Option<Vec<DailyAssignment>>,
}

impl Catalogue {
    /// Crew assignment for a shift, matched on the short duty id.
    pub fn assignment_for(&self, shift_id: &str) -> Option<&DailyAssignment> {
        let short = short_duty_id(shift_id);
        self.daily_assignments
            .as_ref()?
            .iter()
            .find(|a| a.duty_id.trim() == short)
    }

    pub fn circulation(&self, id: &str) -> Option<&Circulation> {
        let id = id.trim().to_uppercase();
        self.circulations.as_ref()?.iter().find(|c| c.id == id)
    }
}

fn parse_time(field: &Option<String>, what: &str, id: &str) -> Option<ServiceMinute> {
    let s = field.as_deref()?;
    let t = ServiceMinute::parse(s);
    if t.is_none() {
        trace!("Malformed {} time {:?} in {}", what, s, id);
    }
    t
}

/// `HH:MM` as a span of minutes, without the service-day rollover.
fn parse_duration(field: &Option<String>) -> Option<u32> {
    let (h, m) = field.as_deref()?.trim().split_once(':')?;
    let (h, m) = (h.trim().parse::<u32>().ok()?, m.trim().parse::<u32>().ok()?);
    if m >= 60 {
        return None;
    }
    Some(h * 60 + m)
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn convert_circulation(c: &raw::Circulation) -> Option<Circulation> {
    let stations = c.estacions.as_deref().unwrap_or_default();
    let first_stop = stations.first().and_then(|s| non_empty(&s.nom));
    let last_stop = stations.last().and_then(|s| non_empty(&s.nom));
    let origin = non_empty(&c.inici).or(first_stop);
    let destination = non_empty(&c.final_).or(last_stop);
    let (origin, destination) = match (origin, destination) {
        (Some(o), Some(d)) => (resolve_station_id(o), resolve_station_id(d)),
        _ => {
            warn!("Circulation {} has no endpoints, skipping", c.id);
            return None;
        }
    };

    let stops = stations
        .iter()
        .filter_map(|s| {
            let name = non_empty(&s.nom)?;
            let time = s.hora.as_ref().or(s.sortida.as_ref()).or(s.arribada.as_ref());
            Some(Stop {
                station: resolve_station_id(name),
                time: time.and_then(|t| ServiceMinute::parse(t)),
                track: s.via.clone(),
            })
        })
        .collect();

    Some(Circulation {
        id: c.id.trim().to_uppercase(),
        line: c.linia.as_deref().unwrap_or_default().trim().to_uppercase(),
        origin,
        destination,
        departure: parse_time(&c.sortida, "departure", &c.id),
        arrival: parse_time(&c.arribada, "arrival", &c.id),
        stops,
    })
}

fn convert_leg(leg: &raw::ShiftLeg, shift_id: &str) -> Option<DutyLeg> {
    match leg {
        raw::ShiftLeg::Code(code) if !code.trim().is_empty() => Some(DutyLeg::code(code)),
        raw::ShiftLeg::Code(_) => None,
        raw::ShiftLeg::Detail(d) => {
            let code = non_empty(&d.codi)?;
            let passenger_on = if code.eq_ignore_ascii_case("viatger") {
                non_empty(&d.observacions)
                    .and_then(|o| o.split('-').next())
                    .map(|o| o.trim().to_uppercase())
                    .filter(|o| !o.is_empty())
            } else {
                None
            };
            Some(DutyLeg {
                passenger_on,
                from: non_empty(&d.inici).map(resolve_station_id),
                to: non_empty(&d.final_).map(resolve_station_id),
                departure: parse_time(&d.sortida, "leg departure", shift_id),
                arrival: parse_time(&d.arribada, "leg arrival", shift_id),
                ..DutyLeg::code(code)
            })
        }
    }
}

pub fn convert_shift(s: &raw::Shift) -> Shift {
    Shift {
        id: s.id.trim().to_string(),
        service: non_empty(&s.servei).map(str::to_string),
        start: parse_time(&s.inici_torn, "shift start", &s.id),
        end: parse_time(&s.final_torn, "shift end", &s.id),
        duration: parse_duration(&s.duracio),
        depot: non_empty(&s.dependencia).map(resolve_station_id),
        legs: s
            .circulations
            .iter()
            .flatten()
            .filter_map(|leg| convert_leg(leg, &s.id))
            .collect(),
    }
}

pub fn convert_assignment(a: &raw::DailyAssignment) -> Option<DailyAssignment> {
    let text = |f: &Option<String>| f.as_deref().unwrap_or_default().trim().to_string();
    let duty_id = non_empty(&a.torn)?.to_string();
    Some(DailyAssignment {
        duty_id,
        name: text(&a.nom),
        surname: text(&a.cognoms),
    })
}

/// Keeps the rows of a table that parse, logging the others.
fn deserialize_rows<'de, D, T>(d: D) -> std::result::Result<Option<Vec<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let rows: Option<Vec<serde_json::Value>> = serde::Deserialize::deserialize(d)?;
    Ok(rows.map(|rows| {
        rows.into_iter()
            .enumerate()
            .filter_map(|(i, row)| match serde_json::from_value(row) {
                Ok(row) => Some(row),
                Err(e) => {
                    warn!("Skipping malformed row {}: {}", i, e);
                    None
                }
            })
            .collect()
    }))
}

/// A full planning input: live snapshot, cuts and the external tables.
#[derive(serde::Deserialize, Debug)]
pub struct Scenario {
    #[serde(default, deserialize_with = "deserialize_opt_time")]
    pub reference_time: Option<ServiceMinute>,
    #[serde(default)]
    pub personnel: Vec<Personnel>,
    #[serde(default)]
    pub cuts: CutSet,
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub circulations: Option<Vec<raw::Circulation>>,
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub shifts: Option<Vec<raw::Shift>>,
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub daily_assignments: Option<Vec<raw::DailyAssignment>>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Scenario> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn catalogue(&self) -> Catalogue {
        let circulations = self.circulations.as_ref().map(|cs| {
            let converted = cs.iter().filter_map(convert_circulation).collect::<Vec<_>>();
            trace!(
                "Converted {} of {} circulations",
                converted.len(),
                cs.len()
            );
            converted
        });
        if circulations.is_none() {
            warn!("Scenario has no circulation table");
        }
        Catalogue {
            circulations,
            shifts: self
                .shifts
                .as_ref()
                .map(|s| s.iter().map(convert_shift).collect()),
            daily_assignments: self
                .daily_assignments
                .as_ref()
                .map(|a| a.iter().filter_map(convert_assignment).collect()),
        }
    }
}
