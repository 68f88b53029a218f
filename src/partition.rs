use crate::config::{EnclavePolicy, EngineConfig};
use crate::cutset::CutSet;
use crate::error::Error;
use crate::network::{resolve_station_id, Network, StationId};
use crate::pathfind::reachable;
use crate::personnel::Personnel;
use log::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Buckets of the partition, in the order personnel are matched against
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum IslandKey {
    Affected,
    Barcelona,
    Valles,
    S1,
    S2,
    L6,
    L7,
    Isolated,
}

impl IslandKey {
    pub fn label(self) -> &'static str {
        match self {
            IslandKey::Affected => "Cut zone / trapped",
            IslandKey::Barcelona => "Barcelona island",
            IslandKey::Valles => "Vallès island (S1+S2)",
            IslandKey::S1 => "S1 island (Terrassa)",
            IslandKey::S2 => "S2 island (Sabadell)",
            IslandKey::L6 => "L6 island",
            IslandKey::L7 => "L7 island",
            IslandKey::Isolated => "Isolated zones",
        }
    }

    /// Reference station whose reachable set forms the island.
    pub fn reference_station(self) -> Option<&'static str> {
        match self {
            IslandKey::Barcelona => Some("PC"),
            IslandKey::S1 => Some("NA"),
            IslandKey::S2 => Some("PN"),
            IslandKey::L6 => Some("RE"),
            IslandKey::L7 => Some("TB"),
            _ => None,
        }
    }
}

impl fmt::Display for IslandKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for IslandKey {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AFFECTED" => Ok(IslandKey::Affected),
            "BCN" | "BARCELONA" => Ok(IslandKey::Barcelona),
            "VALLES" => Ok(IslandKey::Valles),
            "S1" => Ok(IslandKey::S1),
            "S2" => Ok(IslandKey::S2),
            "L6" => Ok(IslandKey::L6),
            "L7" => Ok(IslandKey::L7),
            "ISOLATED" => Ok(IslandKey::Isolated),
            _ => Err(Error::UnknownIsland(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Island {
    pub key: IslandKey,
    pub label: String,
    pub stations: BTreeSet<StationId>,
    /// The S1 and S2 termini reach each other.
    pub unified: bool,
    pub personnel: Vec<Personnel>,
}

impl Island {
    fn new(key: IslandKey, stations: BTreeSet<StationId>, unified: bool) -> Island {
        Island {
            key,
            label: key.label().to_string(),
            stations,
            unified,
            personnel: Vec::new(),
        }
    }

    pub fn num_trains(&self) -> usize {
        self.personnel.iter().filter(|p| p.train().is_some()).count()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Partition {
    pub islands: BTreeMap<IslandKey, Island>,
}

impl Partition {
    pub fn get(&self, key: IslandKey) -> Option<&Island> {
        self.islands.get(&key)
    }

    pub fn island(&self, key: IslandKey) -> Result<&Island, Error> {
        self.get(key)
            .ok_or_else(|| Error::UnknownIsland(key.to_string()))
    }

    pub fn summary(&self) -> String {
        let mut s = String::new();
        for island in self.islands.values() {
            s.push_str(&format!(
                "{:<10} {:>3} stations {:>3} trains {:>3} records{}\n",
                island.key.to_string(),
                island.stations.len(),
                island.num_trains(),
                island.personnel.len(),
                if island.unified { " (unified)" } else { "" }
            ));
        }
        s
    }
}

/// Splits the network into islands for the given cut set and buckets every
/// personnel record into exactly one of them.
///
/// Islands that coincide with an island of higher precedence are left out:
/// with no cut between Sarrià and Reina Elisenda the L6 island is the
/// Barcelona island. When the S1 and S2 islands reach each other they are
/// presented as the single Vallès island.
pub fn partition(
    network: &Network,
    cuts: &CutSet,
    personnel: &[Personnel],
    config: &EngineConfig,
) -> Partition {
    let graph = network.adjacency(Some(cuts));
    let reach = |key: IslandKey| {
        key.reference_station()
            .map(|st| reachable(&graph, st, cuts))
            .unwrap_or_default()
    };

    let bcn = reach(IslandKey::Barcelona);
    let s1 = reach(IslandKey::S1);
    let s2 = reach(IslandKey::S2);
    let unified = s1.contains("PN") || s2.contains("NA");

    let mut candidates = vec![Island::new(IslandKey::Barcelona, bcn, false)];
    if unified {
        let valles = s1.union(&s2).cloned().collect();
        candidates.push(Island::new(IslandKey::Valles, valles, true));
    } else {
        candidates.push(Island::new(IslandKey::S1, s1, false));
        candidates.push(Island::new(IslandKey::S2, s2, false));
    }
    candidates.push(Island::new(IslandKey::L6, reach(IslandKey::L6), false));
    candidates.push(Island::new(IslandKey::L7, reach(IslandKey::L7), false));

    let mut reachable_islands: Vec<Island> = Vec::new();
    for island in candidates {
        if island.stations.is_empty() {
            trace!("Island {} has a cut reference station", island.key);
            continue;
        }
        if let Some(same) = reachable_islands.iter().find(|i| i.stations == island.stations) {
            trace!("Island {} coincides with {}", island.key, same.key);
            continue;
        }
        reachable_islands.push(island);
    }

    let mut affected = Island::new(IslandKey::Affected, cuts.stations().clone(), false);
    let mut isolated = Island::new(IslandKey::Isolated, BTreeSet::new(), false);

    for p in personnel.iter() {
        let st = resolve_station_id(p.station());
        if cuts.is_station_cut(&st) {
            affected.personnel.push(p.clone());
        } else if let Some(island) = reachable_islands
            .iter_mut()
            .find(|i| i.stations.contains(&st))
        {
            island.personnel.push(p.clone());
        } else {
            match config.enclave_policy {
                EnclavePolicy::Affected => affected.personnel.push(p.clone()),
                EnclavePolicy::Isolated => {
                    isolated.stations.insert(st);
                    isolated.personnel.push(p.clone());
                }
            }
        }
    }

    let mut islands = BTreeMap::new();
    islands.insert(IslandKey::Affected, affected);
    if config.enclave_policy == EnclavePolicy::Isolated {
        islands.insert(IslandKey::Isolated, isolated);
    }
    for island in reachable_islands {
        islands.insert(island.key, island);
    }

    info!(
        "Partitioned {} records into {} islands ({} cut stations, {} cut tracks)",
        personnel.len(),
        islands.len(),
        cuts.stations().len(),
        cuts.track_cuts().count()
    );
    Partition { islands }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutset::Track;
    use crate::personnel::{Crew, RestingCrew, TrainUnit};

    fn train(id: &str, station: &str) -> Personnel {
        Personnel::Train(TrainUnit {
            id: id.to_string(),
            line: None,
            station: station.to_string(),
            deduced_circulation: None,
            crew: None,
        })
    }

    fn rest(duty: &str, station: &str) -> Personnel {
        Personnel::Rest(RestingCrew {
            station: station.to_string(),
            crew: Crew {
                duty_id: duty.to_string(),
                driver_name: String::new(),
                driver_surname: String::new(),
                phones: vec![],
                shift_start: None,
                shift_end: None,
                shift_depot: None,
            },
        })
    }

    fn snapshot() -> Vec<Personnel> {
        vec![
            train("T1", "PC"),
            train("T2", "TR"),
            train("T3", "SQ"),
            train("T4", "SC"),
            rest("Q1", "SR"),
            rest("Q2", "NA"),
            rest("Q3", "pn"),
        ]
    }

    fn keys(island: &Island) -> Vec<String> {
        island.personnel.iter().map(|p| p.key()).collect()
    }

    #[test]
    fn no_cuts_is_one_island() {
        let network = Network::commuter();
        let part = partition(&network, &CutSet::new(), &snapshot(), &EngineConfig::default());
        let keys = part.islands.keys().copied().collect::<Vec<_>>();
        assert_eq!(keys, vec![IslandKey::Affected, IslandKey::Barcelona]);
        assert_eq!(part.islands[&IslandKey::Barcelona].stations.len(), 37);
        assert_eq!(part.islands[&IslandKey::Barcelona].personnel.len(), 7);
    }

    #[test]
    fn cutting_the_junction_splits_the_valles() {
        let network = Network::commuter();
        let mut cuts = CutSet::new();
        cuts.toggle_station("SC");
        let part = partition(&network, &cuts, &snapshot(), &EngineConfig::default());

        let s1 = part.get(IslandKey::S1).unwrap();
        let s2 = part.get(IslandKey::S2).unwrap();
        assert!(!s1.unified && !s2.unified);
        assert!(part.get(IslandKey::Valles).is_none());
        assert!(part.get(IslandKey::L6).is_none());
        assert_eq!(keys(s1), vec!["TRAIN:T2", "REST:Q2@NA"]);
        assert_eq!(keys(s2), vec!["TRAIN:T3", "REST:Q3@pn"]);
        assert_eq!(keys(&part.islands[&IslandKey::Affected]), vec!["TRAIN:T4"]);
        assert_eq!(
            keys(&part.islands[&IslandKey::Barcelona]),
            vec!["TRAIN:T1", "REST:Q1@SR"]
        );
    }

    #[test]
    fn valles_stays_unified_when_only_barcelona_is_cut_off() {
        let network = Network::commuter();
        let mut cuts = CutSet::new();
        cuts.toggle_station("VD");
        let part = partition(&network, &cuts, &snapshot(), &EngineConfig::default());
        let valles = part.get(IslandKey::Valles).unwrap();
        assert!(valles.unified);
        assert!(valles.stations.contains("SC"));
        assert!(part.get(IslandKey::S1).is_none());
        assert!(part.get(IslandKey::S2).is_none());
        assert_eq!(valles.personnel.len(), 5);
    }

    #[test]
    fn single_track_cut_does_not_disconnect() {
        let network = Network::commuter();
        let mut cuts = CutSet::new();
        cuts.toggle_track("SR", "RE", Track::One);
        let part = partition(&network, &cuts, &snapshot(), &EngineConfig::default());
        assert!(part.get(IslandKey::L6).is_none());
        assert!(part.islands[&IslandKey::Barcelona].stations.contains("RE"));
    }

    #[test]
    fn enclave_policy_decides_where_isolated_records_go() {
        let network = Network::commuter();
        let mut cuts = CutSet::new();
        // HG..EN is reachable from neither the hub nor the S1 terminus.
        cuts.toggle_station("MS");
        cuts.toggle_station("NA");
        let people = vec![train("T9", "RB"), train("T1", "PC")];

        let part = partition(&network, &cuts, &people, &EngineConfig::default());
        assert_eq!(keys(&part.islands[&IslandKey::Affected]), vec!["TRAIN:T9"]);
        assert!(part.get(IslandKey::Isolated).is_none());

        let config = EngineConfig {
            enclave_policy: EnclavePolicy::Isolated,
            ..Default::default()
        };
        let part = partition(&network, &cuts, &people, &config);
        assert!(part.islands[&IslandKey::Affected].personnel.is_empty());
        let isolated = &part.islands[&IslandKey::Isolated];
        assert_eq!(keys(isolated), vec!["TRAIN:T9"]);
        assert!(isolated.stations.contains("RB"));
    }

    #[test]
    fn station_names_are_resolved_before_matching() {
        let network = Network::commuter();
        let mut cuts = CutSet::new();
        cuts.toggle_station("SC");
        let people = vec![train("T4", "Sant Cugat"), rest("Q1", "Sarrià"), train("T2", "Terrassa Rambla")];
        let config = EngineConfig {
            enclave_policy: EnclavePolicy::Isolated,
            ..Default::default()
        };
        let part = partition(&network, &cuts, &people, &config);
        assert_eq!(keys(&part.islands[&IslandKey::Affected]), vec!["TRAIN:T4"]);
        assert!(part.islands[&IslandKey::Isolated].personnel.is_empty());
        assert!(part.islands[&IslandKey::Isolated].stations.is_empty());
        assert_eq!(keys(&part.islands[&IslandKey::Barcelona]), vec!["REST:Q1@Sarrià"]);
        assert_eq!(keys(part.get(IslandKey::S1).unwrap()), vec!["TRAIN:T2"]);
    }

    #[test]
    fn every_record_lands_in_exactly_one_bucket() {
        let network = Network::commuter();
        let people = snapshot();
        for cut in ["SC", "SR", "GR", "PC", "BT"] {
            let mut cuts = CutSet::new();
            cuts.toggle_station(cut);
            let first = partition(&network, &cuts, &people, &EngineConfig::default());
            let mut seen = first
                .islands
                .values()
                .flat_map(|i| keys(i))
                .collect::<Vec<_>>();
            seen.sort();
            let mut expected = people.iter().map(|p| p.key()).collect::<Vec<_>>();
            expected.sort();
            assert_eq!(seen, expected, "cut {}", cut);

            let second = partition(&network, &cuts, &people, &EngineConfig::default());
            for (key, island) in first.islands.iter() {
                assert_eq!(keys(island), keys(&second.islands[key]));
                assert_eq!(island.stations, second.islands[key].stations);
            }
        }
    }

    #[test]
    fn island_keys_parse() {
        assert_eq!("bcn".parse::<IslandKey>().unwrap(), IslandKey::Barcelona);
        assert_eq!("Valles".parse::<IslandKey>().unwrap(), IslandKey::Valles);
        assert!("north".parse::<IslandKey>().is_err());
    }
}
