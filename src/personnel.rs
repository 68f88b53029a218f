use crate::network::{resolve_station_id, Line, StationId};
use crate::time::ServiceMinute;

pub type DutyId = String;

/// Feed stations arrive as codes or free-text names.
fn deserialize_station<'de, D>(d: D) -> Result<StationId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name: String = serde::Deserialize::deserialize(d)?;
    Ok(resolve_station_id(&name))
}

fn deserialize_opt_station<'de, D>(d: D) -> Result<Option<StationId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name: Option<String> = serde::Deserialize::deserialize(d)?;
    Ok(name
        .filter(|n| !n.trim().is_empty())
        .map(|n| resolve_station_id(&n)))
}

/// A crew member's duty as reported by the live feed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Crew {
    #[serde(alias = "torn")]
    pub duty_id: DutyId,
    #[serde(default, alias = "driverName")]
    pub driver_name: String,
    #[serde(default, alias = "driverSurname")]
    pub driver_surname: String,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default, alias = "shiftStartMin")]
    pub shift_start: Option<ServiceMinute>,
    #[serde(default, alias = "shiftEndMin")]
    pub shift_end: Option<ServiceMinute>,
    #[serde(default, alias = "shiftDep", deserialize_with = "deserialize_opt_station")]
    pub shift_depot: Option<StationId>,
}

impl Crew {
    pub fn display_name(&self) -> String {
        match (self.driver_surname.is_empty(), self.driver_name.is_empty()) {
            (true, true) => self.duty_id.clone(),
            (true, false) => self.driver_name.clone(),
            (false, true) => self.driver_surname.clone(),
            (false, false) => format!("{}, {}", self.driver_surname, self.driver_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainUnit {
    pub id: String,
    #[serde(default, alias = "linia")]
    pub line: Option<String>,
    #[serde(alias = "stationId", deserialize_with = "deserialize_station")]
    pub station: StationId,
    /// Set when the unit has been matched to a running circulation.
    #[serde(default, alias = "deducedCirculationId")]
    pub deduced_circulation: Option<String>,
    /// Driver on board, if any.
    #[serde(default)]
    pub crew: Option<Crew>,
}

impl TrainUnit {
    pub fn is_active(&self) -> bool {
        self.deduced_circulation.is_some()
    }

    pub fn line(&self) -> Option<Line> {
        self.line.as_deref().and_then(Line::from_code)
    }
}

/// Off-duty or stand-by crew at a station.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RestingCrew {
    #[serde(alias = "stationId", deserialize_with = "deserialize_station")]
    pub station: StationId,
    #[serde(flatten)]
    pub crew: Crew,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Personnel {
    Train(TrainUnit),
    Rest(RestingCrew),
}

impl Personnel {
    pub fn station(&self) -> &str {
        match self {
            Personnel::Train(t) => &t.station,
            Personnel::Rest(r) => &r.station,
        }
    }

    pub fn crew(&self) -> Option<&Crew> {
        match self {
            Personnel::Train(t) => t.crew.as_ref(),
            Personnel::Rest(r) => Some(&r.crew),
        }
    }

    pub fn train(&self) -> Option<&TrainUnit> {
        match self {
            Personnel::Train(t) => Some(t),
            Personnel::Rest(_) => None,
        }
    }

    /// Identity used to check that every record lands in exactly one bucket.
    pub fn key(&self) -> String {
        match self {
            Personnel::Train(t) => format!("TRAIN:{}", t.id),
            Personnel::Rest(r) => format!("REST:{}@{}", r.crew.duty_id, r.station),
        }
    }
}
