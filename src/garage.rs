use crate::config::EngineConfig;
use crate::cutset::CutSet;
use crate::network::{resolve_station_id, Network, StationId};
use crate::pathfind::{is_route, shortest_path};
use crate::personnel::Personnel;
use log::*;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct GarageCapacity {
    pub station: &'static str,
    pub four_car: u32,
    pub three_car: u32,
    /// Units parked at the start of service.
    pub total: u32,
    /// Units the garage can hold while service is running.
    pub in_service: u32,
}

#[rustfmt::skip]
pub const GARAGES: &[GarageCapacity] = &[
    GarageCapacity { station: "PC", four_car: 4, three_car: 1, total: 5, in_service: 2 },
    GarageCapacity { station: "RE", four_car: 3, three_car: 3, total: 6, in_service: 5 },
    GarageCapacity { station: "RB", four_car: 22, three_car: 1, total: 23, in_service: 24 },
    GarageCapacity { station: "NA", four_car: 15, three_car: 0, total: 15, in_service: 11 },
    GarageCapacity { station: "PN", four_car: 12, three_car: 0, total: 12, in_service: 9 },
];

/// Parked units per station.
pub fn occupation(personnel: &[Personnel]) -> BTreeMap<StationId, u32> {
    let mut counts = BTreeMap::new();
    for unit in personnel.iter().filter_map(|p| p.train()) {
        if !unit.is_active() {
            *counts.entry(resolve_station_id(&unit.station)).or_insert(0) += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GarageStatus {
    pub garage: GarageCapacity,
    pub parked: u32,
    pub over_capacity: bool,
}

pub fn garage_report(personnel: &[Personnel]) -> Vec<GarageStatus> {
    let parked = occupation(personnel);
    GARAGES
        .iter()
        .map(|g| {
            let n = parked.get(g.station).copied().unwrap_or(0);
            if n > g.total {
                warn!("Garage {} holds {} units, capacity {}", g.station, n, g.total);
            }
            GarageStatus {
                garage: *g,
                parked: n,
                over_capacity: n > g.total,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Impact {
    /// Units standing at a cut station.
    pub trains: Vec<String>,
    pub stranded_passengers: u32,
}

pub fn impact(cuts: &CutSet, personnel: &[Personnel], config: &EngineConfig) -> Impact {
    let trains = personnel
        .iter()
        .filter_map(|p| p.train())
        .filter(|t| cuts.is_station_cut(&resolve_station_id(&t.station)))
        .map(|t| t.id.clone())
        .collect::<Vec<_>>();
    let stranded_passengers = trains.len() as u32 * config.passengers_per_train;
    Impact {
        trains,
        stranded_passengers,
    }
}

/// Garage inside `stations` closest to `from` by hop count on the cut network.
pub fn nearest_garage(
    network: &Network,
    from: &str,
    stations: &BTreeSet<StationId>,
    cuts: &CutSet,
) -> Option<StationId> {
    GARAGES
        .iter()
        .filter(|g| stations.contains(g.station) && !cuts.is_station_cut(g.station))
        .filter_map(|g| {
            if g.station == from {
                return Some((0, g.station));
            }
            let path = shortest_path(network, from, g.station, Some(cuts));
            if is_route(&path) {
                Some((path.len() - 1, g.station))
            } else {
                None
            }
        })
        .min_by_key(|(hops, _)| *hops)
        .map(|(_, s)| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personnel::TrainUnit;

    fn train(id: &str, station: &str, active: bool) -> Personnel {
        Personnel::Train(TrainUnit {
            id: id.to_string(),
            line: None,
            station: station.to_string(),
            deduced_circulation: if active { Some("D101".to_string()) } else { None },
            crew: None,
        })
    }

    #[test]
    fn counts_parked_units_only() {
        let feed = vec![
            train("1", "RB", false),
            train("2", "Rubí Centre", false),
            train("3", "RB", true),
            train("4", "PC", false),
        ];
        let occ = occupation(&feed);
        assert_eq!(occ.get("RB"), Some(&2));
        assert_eq!(occ.get("PC"), Some(&1));
        let report = garage_report(&feed);
        assert_eq!(report.len(), GARAGES.len());
        assert!(report.iter().all(|s| !s.over_capacity));
    }

    #[test]
    fn flags_overfull_garage() {
        let feed = (0..6).map(|i| train(&i.to_string(), "PC", false)).collect::<Vec<_>>();
        let pc = garage_report(&feed).into_iter().find(|s| s.garage.station == "PC").unwrap();
        assert_eq!(pc.parked, 6);
        assert!(pc.over_capacity);
    }

    #[test]
    fn impact_counts_trains_at_cut_stations() {
        let mut cuts = CutSet::new();
        cuts.toggle_station("SC");
        let feed = vec![train("1", "SC", true), train("2", "Sant Cugat", false), train("3", "SR", true)];
        let i = impact(&cuts, &feed, &EngineConfig::default());
        assert_eq!(i.trains, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(i.stranded_passengers, 240);
    }

    #[test]
    fn nearest_garage_respects_island_and_cuts() {
        let network = Network::commuter();
        let city = ["PC", "PR", "GR", "SG", "MN", "BN", "TT", "SR", "RE"]
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>();
        let cuts = CutSet::new();
        assert_eq!(nearest_garage(&network, "SG", &city, &cuts).as_deref(), Some("PC"));
        assert_eq!(nearest_garage(&network, "TT", &city, &cuts).as_deref(), Some("RE"));
        assert_eq!(nearest_garage(&network, "RE", &city, &cuts).as_deref(), Some("RE"));
        let valles = ["SJ", "BT"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        assert_eq!(nearest_garage(&network, "SJ", &valles, &cuts), None);
    }
}
