use crate::error::{Error, Result};
use crate::network::{line_stations_present, resolve_station_id, Line, Priority, StationId, LINE_ORDER};
use crate::partition::Island;
use crate::personnel::{Crew, Personnel, TrainUnit};
use log::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// The resources stranded in one island.
#[derive(Debug, Clone)]
pub struct IslandInventory {
    pub stations: BTreeSet<StationId>,
    /// Every physical unit, in feed order.
    pub units: Vec<TrainUnit>,
    /// Crews with their current station: resting crews and drivers on board.
    pub crews: Vec<(Crew, StationId)>,
}

impl IslandInventory {
    pub fn from_island(island: &Island) -> IslandInventory {
        let mut units = Vec::new();
        let mut crews = Vec::new();
        for p in island.personnel.iter() {
            if let Personnel::Train(t) = p {
                units.push(t.clone());
            }
            if let Some(crew) = p.crew() {
                crews.push((crew.clone(), resolve_station_id(p.station())));
            }
        }
        IslandInventory {
            stations: island.stations.clone(),
            units,
            crews,
        }
    }

    pub fn active_units(&self) -> impl Iterator<Item = &TrainUnit> {
        self.units.iter().filter(|u| u.is_active())
    }

    pub fn garage_units(&self) -> impl Iterator<Item = &TrainUnit> {
        self.units.iter().filter(|u| !u.is_active())
    }

    pub fn total_units(&self) -> u32 {
        self.units.len() as u32
    }

    pub fn has(&self, station: &str) -> bool {
        self.stations.contains(station)
    }

    pub fn supports_l7_full(&self) -> bool {
        self.has("PC") && self.has("TB")
    }

    pub fn supports_l7_local(&self) -> bool {
        self.has("GR") && self.has("TB") && !self.supports_l7_full()
    }

    pub fn supports(&self, line: Line) -> bool {
        match line {
            Line::L12 => self.has("SR") && self.has("RE"),
            Line::L7 => self.supports_l7_full() || self.supports_l7_local(),
            Line::L6 | Line::S1 | Line::S2 => line_stations_present(line, &self.stations),
        }
    }

    pub fn supported_lines(&self) -> Vec<Line> {
        LINE_ORDER.iter().copied().filter(|l| self.supports(*l)).collect()
    }

    pub fn route_description(&self, line: Line) -> &'static str {
        match line {
            Line::L12 => "L12 shuttle SR-RE",
            Line::L7 if self.supports_l7_full() => "L7 shuttle PC-TB",
            Line::L7 => "L7 shuttle GR-TB",
            Line::S1 => "S1 shuttle (Terrassa)",
            Line::S2 => "S2 shuttle (Sabadell)",
            Line::L6 => "L6 urban reinforcement",
        }
    }
}

/// Operator's requested unit count per line. The sum never exceeds the
/// island's physical units.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LineAssignment {
    counts: BTreeMap<Line, u32>,
    capacity: u32,
}

impl LineAssignment {
    pub fn new(capacity: u32) -> LineAssignment {
        LineAssignment {
            counts: BTreeMap::new(),
            capacity,
        }
    }

    pub fn count(&self, line: Line) -> u32 {
        self.counts.get(&line).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn set(&mut self, line: Line, count: u32) -> Result<()> {
        let others = self.total() - self.count(line);
        let requested = others.saturating_add(count);
        if requested > self.capacity {
            return Err(Error::CapacityExceeded {
                requested,
                available: self.capacity,
            });
        }
        if count == 0 {
            self.counts.remove(&line);
        } else {
            self.counts.insert(line, count);
        }
        Ok(())
    }

    /// Decrements saturate at zero; increments past capacity are rejected.
    pub fn adjust(&mut self, line: Line, delta: i32) -> Result<()> {
        let next = (i64::from(self.count(line)) + i64::from(delta)).max(0);
        self.set(line, u32::try_from(next).unwrap_or(u32::MAX))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Line, u32)> + '_ {
        self.counts.iter().map(|(l, c)| (*l, *c))
    }
}

/// Default counts offered to the operator: one unit on L12, a small L7
/// service, then round-robin over S1, S2 and L6 while both units and drivers
/// remain.
pub fn suggest_assignment(inventory: &IslandInventory) -> LineAssignment {
    let mut assignment = LineAssignment::new(inventory.total_units());
    let mut counts: BTreeMap<Line, u32> = BTreeMap::new();
    let mut units = inventory.total_units();
    let mut drivers = inventory.crews.len() as u32;

    let mut try_inc = |line: Line, counts: &mut BTreeMap<Line, u32>| {
        if units > 0 && drivers > 0 {
            *counts.entry(line).or_default() += 1;
            units -= 1;
            drivers -= 1;
            true
        } else {
            false
        }
    };

    if inventory.supports(Line::L12) {
        try_inc(Line::L12, &mut counts);
    }

    if inventory.supports(Line::L7) {
        let l7_units = inventory
            .units
            .iter()
            .filter(|u| u.line() == Some(Line::L7))
            .count() as u32;
        let target = if l7_units >= 4 { 3 } else { l7_units.max(2) };
        for _ in 0..target {
            try_inc(Line::L7, &mut counts);
        }
    }

    loop {
        let mut changed = false;
        for line in [Line::S1, Line::S2, Line::L6] {
            if inventory.supports(line) && try_inc(line, &mut counts) {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    if counts.is_empty() && inventory.total_units() > 0 && !inventory.crews.is_empty() {
        if inventory.supports(Line::S1) {
            counts.insert(Line::S1, 1);
        } else {
            counts.insert(Line::S2, 1);
        }
    }

    for (line, count) in counts {
        // Counts are bounded by the unit total above.
        if let Err(e) = assignment.set(line, count) {
            warn!("Suggested assignment rejected: {}", e);
        }
    }
    assignment
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum AssignedDriver {
    Crew(Crew),
    /// No crew left in the island for this unit.
    Unassigned,
}

impl AssignedDriver {
    pub fn duty_id(&self) -> Option<&str> {
        match self {
            AssignedDriver::Crew(c) => Some(&c.duty_id),
            AssignedDriver::Unassigned => None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ShuttleAssignment {
    pub unit: TrainUnit,
    pub driver: AssignedDriver,
    pub line: Line,
    pub route: String,
    pub priority: Priority,
}

/// Pairs units with drivers line by line in priority order. Units are taken
/// from the active queue first, then from the garage queue; once drivers run
/// out the pairing gets [`AssignedDriver::Unassigned`]. The assignment is
/// trusted to respect the island's capacity.
pub fn allocate(inventory: &IslandInventory, assignment: &LineAssignment) -> Vec<ShuttleAssignment> {
    let mut active: VecDeque<&TrainUnit> = inventory.active_units().collect();
    let mut garage: VecDeque<&TrainUnit> = inventory.garage_units().collect();
    let mut drivers: VecDeque<&Crew> = inventory.crews.iter().map(|(c, _)| c).collect();
    let mut formed = Vec::new();

    for line in LINE_ORDER.iter().copied() {
        let count = assignment.count(line);
        for _ in 0..count {
            let unit = match active.pop_front().or_else(|| garage.pop_front()) {
                Some(u) => u,
                None => {
                    warn!("No units left for {} ({} requested)", line, count);
                    break;
                }
            };
            let driver = drivers
                .pop_front()
                .map(|c| AssignedDriver::Crew(c.clone()))
                .unwrap_or(AssignedDriver::Unassigned);
            formed.push(ShuttleAssignment {
                unit: unit.clone(),
                driver,
                line,
                route: inventory.route_description(line).to_string(),
                priority: line.priority(),
            });
        }
    }

    debug!(
        "Formed {} shuttle services from {} units and {} crews",
        formed.len(),
        inventory.units.len(),
        inventory.crews.len()
    );
    formed
}
