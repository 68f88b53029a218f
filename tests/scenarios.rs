use shuttleplan::allocate::{allocate, AssignedDriver, IslandInventory, LineAssignment};
use shuttleplan::catalogue::{Catalogue, Scenario};
use shuttleplan::config::EngineConfig;
use shuttleplan::cutset::{CutSet, Track};
use shuttleplan::network::{Line, Network};
use shuttleplan::partition::{partition, IslandKey, Partition};
use shuttleplan::personnel::{Crew, Personnel, RestingCrew, TrainUnit};
use shuttleplan::relief::{find_relief, ReliefRequest};
use shuttleplan::time::ServiceMinute;
use shuttleplan::timetable::{generate, Direction, Timetable, TimetableRequest, TripKind, TripLink};
use std::collections::BTreeSet;

const SCENARIO: &str = r#"{
    "reference_time": "08:00",
    "cuts": {"stations": ["SC"]},
    "personnel": [
        {"type":"TRAIN","id":"112.01","linia":"L6","stationId":"PC","deducedCirculationId":"A101",
         "crew":{"torn":"Q0404","driverName":"Pau","driverSurname":"Serra"}},
        {"type":"TRAIN","id":"112.02","linia":"S1","stationId":"SR","deducedCirculationId":"D103"},
        {"type":"TRAIN","id":"113.03","stationId":"RE"},
        {"type":"TRAIN","id":"113.04","linia":"S1","stationId":"NA"},
        {"type":"TRAIN","id":"113.05","linia":"S2","stationId":"PN"},
        {"type":"TRAIN","id":"113.06","linia":"S1","stationId":"SC","deducedCirculationId":"D105"},
        {"type":"REST","stationId":"SR","torn":"Q0401","driverName":"Anna","driverSurname":"Puig"},
        {"type":"REST","stationId":"PC","torn":"Q0402","driverName":"Marc","driverSurname":"Vidal"},
        {"type":"REST","stationId":"NA","torn":"Q0403","driverName":"Laia","driverSurname":"Font"}
    ],
    "circulations": [
        {"id":"A105","linia":"L6","inici":"PC","final":"SR","sortida":"07:40","arribada":"07:58"},
        {"id":"A108","linia":"L6","inici":"SR","final":"PC","sortida":"07:45","arribada":"08:03"}
    ],
    "shifts": [],
    "daily_assignments": []
}"#;

fn scenario() -> Scenario {
    serde_json::from_str(SCENARIO).unwrap()
}

fn keys(p: &Partition) -> Vec<IslandKey> {
    p.islands.keys().copied().collect()
}

fn plan(
    scenario: &Scenario,
    cuts: &CutSet,
    catalogue: &Catalogue,
    counts: &[(Line, u32)],
) -> (IslandInventory, Timetable) {
    let network = Network::commuter();
    let config = EngineConfig::default();
    let p = partition(&network, cuts, &scenario.personnel, &config);
    let inventory = IslandInventory::from_island(p.island(IslandKey::Barcelona).unwrap());
    let mut assignment = LineAssignment::new(inventory.total_units());
    for (line, n) in counts {
        assignment.set(*line, *n).unwrap();
    }
    let request = TimetableRequest {
        inventory: &inventory,
        assignment: &assignment,
        reference: scenario.reference_time.unwrap(),
        cuts,
        manual_headway: None,
    };
    let timetable = generate(&network, &config, catalogue, &request);
    (inventory, timetable)
}

#[test]
fn station_cut_splits_the_valles_branches() {
    let s = scenario();
    let p = partition(&Network::commuter(), &s.cuts, &s.personnel, &EngineConfig::default());
    assert_eq!(
        keys(&p),
        vec![IslandKey::Affected, IslandKey::Barcelona, IslandKey::S1, IslandKey::S2]
    );
    assert!(p.islands.values().all(|i| !i.unified));

    let ids = |key: IslandKey| {
        p.get(key)
            .unwrap()
            .personnel
            .iter()
            .filter_map(|r| r.train())
            .map(|t| t.id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(IslandKey::Barcelona), vec!["112.01", "112.02", "113.03"]);
    assert_eq!(ids(IslandKey::S1), vec!["113.04"]);
    assert_eq!(ids(IslandKey::S2), vec!["113.05"]);
    assert_eq!(ids(IslandKey::Affected), vec!["113.06"]);
    assert!(p.get(IslandKey::S1).unwrap().stations.contains("NA"));
    assert!(!p.get(IslandKey::S1).unwrap().stations.contains("PN"));
}

#[test]
fn every_record_lands_in_one_island_and_partition_is_stable() {
    let s = scenario();
    let network = Network::commuter();
    let config = EngineConfig::default();
    let first = partition(&network, &s.cuts, &s.personnel, &config);
    let second = partition(&network, &s.cuts, &s.personnel, &config);

    let all = first
        .islands
        .values()
        .flat_map(|i| i.personnel.iter().map(|p| p.key()))
        .collect::<Vec<_>>();
    let unique = all.iter().cloned().collect::<BTreeSet<_>>();
    assert_eq!(all.len(), s.personnel.len());
    assert_eq!(unique.len(), s.personnel.len());

    assert_eq!(keys(&first), keys(&second));
    for (key, island) in first.islands.iter() {
        let other = second.get(*key).unwrap();
        assert_eq!(island.stations, other.stations);
        assert_eq!(island.personnel, other.personnel);
    }
    assert_eq!(first.summary(), second.summary());
}

#[test]
fn single_track_cut_degrades_without_splitting() {
    let s = scenario();
    let mut cuts = CutSet::new();
    cuts.toggle_track("GR", "SG", Track::One);
    let p = partition(&Network::commuter(), &cuts, &s.personnel, &EngineConfig::default());
    assert_eq!(keys(&p), vec![IslandKey::Affected, IslandKey::Barcelona]);
    assert!(p.get(IslandKey::Affected).unwrap().personnel.is_empty());

    let catalogue = s.catalogue();
    let (_, clear) = plan(&s, &CutSet::new(), &catalogue, &[(Line::L6, 1)]);
    let (_, degraded_plan) = plan(&s, &cuts, &catalogue, &[(Line::L6, 1)]);
    let clear = clear.line(Line::L6).unwrap();
    let degraded = degraded_plan.line(Line::L6).unwrap();
    assert_eq!(clear.single_track_segments, 0);
    assert_eq!(degraded.single_track_segments, 1);
    assert_eq!(degraded.travel_minutes, clear.travel_minutes + 3);
    assert!(degraded.headway_minutes >= 20);

    for direction in [Direction::Ascending, Direction::Descending] {
        let mut departures = degraded_plan
            .trips
            .iter()
            .filter(|t| t.line == Line::L6 && t.kind == TripKind::Service && t.direction == direction)
            .map(|t| t.departure.minutes())
            .collect::<Vec<_>>();
        departures.sort_unstable();
        assert!(departures.len() >= 2, "{:?}", direction);
        for pair in departures.windows(2) {
            assert!(pair[1] - pair[0] >= 20, "{:?} {:?}", direction, pair);
        }
    }
}

#[test]
fn degraded_route_raises_headway_floor() {
    let s = scenario();
    let mut cuts = CutSet::new();
    cuts.toggle_track("SR", "RE", Track::Two);
    let catalogue = Catalogue {
        circulations: Some(vec![]),
        shifts: None,
        daily_assignments: None,
    };
    // Three units share the short L12 run, so only the floor applies.
    let crew = |duty: &str| Crew {
        duty_id: duty.to_string(),
        driver_name: String::new(),
        driver_surname: String::new(),
        phones: vec![],
        shift_start: None,
        shift_end: None,
        shift_depot: None,
    };
    let mut personnel = (1..=3)
        .map(|i| {
            Personnel::Train(TrainUnit {
                id: format!("U{}", i),
                line: None,
                station: "SR".to_string(),
                deduced_circulation: None,
                crew: None,
            })
        })
        .collect::<Vec<_>>();
    for duty in ["Q1", "Q2", "Q3"] {
        personnel.push(Personnel::Rest(RestingCrew {
            station: "SR".to_string(),
            crew: crew(duty),
        }));
    }
    let city = Scenario {
        reference_time: s.reference_time,
        personnel,
        cuts: CutSet::new(),
        circulations: None,
        shifts: None,
        daily_assignments: None,
    };
    let (_, clear) = plan(&city, &CutSet::new(), &catalogue, &[(Line::L12, 3)]);
    let (_, degraded) = plan(&city, &cuts, &catalogue, &[(Line::L12, 3)]);
    assert_eq!(clear.line(Line::L12).unwrap().headway_minutes, 10);
    let l12 = degraded.line(Line::L12).unwrap();
    assert_eq!(l12.travel_minutes, 8 + 3);
    assert_eq!(l12.headway_minutes, 20);
}

#[test]
fn active_units_and_drivers_are_paired_first() {
    let train = |id: &str, active: bool| {
        Personnel::Train(TrainUnit {
            id: id.to_string(),
            line: None,
            station: "SR".to_string(),
            deduced_circulation: if active { Some(format!("D{}", id)) } else { None },
            crew: None,
        })
    };
    let rest = |duty: &str| {
        Personnel::Rest(RestingCrew {
            station: "PC".to_string(),
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
    };
    let personnel = vec![
        train("G1", false),
        train("A1", true),
        rest("Q1"),
        train("A2", true),
        rest("Q2"),
        train("G2", false),
        rest("Q3"),
        train("A3", true),
        rest("Q4"),
    ];
    let p = partition(&Network::commuter(), &CutSet::new(), &personnel, &EngineConfig::default());
    let inventory = IslandInventory::from_island(p.island(IslandKey::Barcelona).unwrap());
    let mut assignment = LineAssignment::new(inventory.total_units());
    assignment.set(Line::S1, 3).unwrap();
    assignment.set(Line::S2, 2).unwrap();
    assert!(assignment.set(Line::L6, 1).is_err());

    let services = allocate(&inventory, &assignment);
    assert_eq!(services.len(), 5);
    let units = services.iter().map(|s| s.unit.id.as_str()).collect::<Vec<_>>();
    assert_eq!(units, vec!["A1", "A2", "A3", "G1", "G2"]);
    let drivers = services.iter().map(|s| s.driver.duty_id()).collect::<Vec<_>>();
    assert_eq!(drivers, vec![Some("Q1"), Some("Q2"), Some("Q3"), Some("Q4"), None]);
    assert_eq!(services[4].driver, AssignedDriver::Unassigned);
    assert_eq!(services.iter().filter(|s| s.line == Line::S1).count(), 3);
}

#[test]
fn timetable_continues_numbering_and_chains_units() {
    let s = scenario();
    let catalogue = s.catalogue();
    let (inventory, timetable) = plan(&s, &s.cuts, &catalogue, &[(Line::L6, 1), (Line::S1, 1)]);

    let l6 = timetable.line(Line::L6).unwrap();
    assert_eq!((l6.origin.as_str(), l6.destination.as_str()), ("PC", "SR"));
    assert_eq!(l6.travel_minutes, 18);
    let s1 = timetable.line(Line::S1).unwrap();
    assert_eq!((s1.origin.as_str(), s1.destination.as_str()), ("PC", "VD"));

    let l6_trips = timetable
        .trips
        .iter()
        .filter(|t| t.line == Line::L6 && t.kind == TripKind::Service)
        .collect::<Vec<_>>();
    let first_up = l6_trips.iter().find(|t| t.direction == Direction::Ascending).unwrap();
    let first_down = l6_trips.iter().find(|t| t.direction == Direction::Descending).unwrap();
    assert_eq!(first_up.id, "AA107");
    assert_eq!(first_down.id, "AA110");

    for line in [Line::L6, Line::S1] {
        for dir in [Direction::Ascending, Direction::Descending] {
            let numbers = timetable
                .trips
                .iter()
                .filter(|t| t.line == line && t.direction == dir && t.kind == TripKind::Service)
                .map(|t| t.number)
                .collect::<Vec<_>>();
            let parity = if dir == Direction::Ascending { 1 } else { 0 };
            assert!(numbers.iter().all(|n| n % 2 == parity));
            assert!(numbers.windows(2).all(|w| w[1] == w[0] + 2));
        }
    }

    let ids = timetable.trips.iter().map(|t| t.id.clone()).collect::<BTreeSet<_>>();
    assert_eq!(ids.len(), timetable.trips.len());

    for unit in inventory.units.iter() {
        let trips = timetable.trips_of_unit(&unit.id);
        assert!(!trips.is_empty(), "unit {} has no trip", unit.id);
        let expected_first = if unit.is_active() {
            TripLink::InService
        } else {
            TripLink::DepartDepot
        };
        assert_eq!(trips[0].previous, expected_first);
        assert_eq!(trips[trips.len() - 1].next, TripLink::EndOfService);
        for w in trips.windows(2) {
            assert_eq!(w[0].next, TripLink::Trip(w[1].id.clone()));
            assert_eq!(w[1].previous, TripLink::Trip(w[0].id.clone()));
        }
    }
}

#[test]
fn unused_unit_is_retired_once() {
    let s = scenario();
    let catalogue = s.catalogue();
    let (_, timetable) = plan(&s, &s.cuts, &catalogue, &[(Line::L6, 1), (Line::S1, 1)]);
    let retired = timetable.trips_of_unit("113.03");
    assert_eq!(retired.len(), 1);
    assert_eq!(retired[0].kind, TripKind::DepotReturn);
    assert!(retired[0].number >= 801);
    assert_eq!(retired[0].id, "DA801");
    assert_eq!(retired[0].direction, Direction::Descending);
    assert_eq!(retired[0].departure, ServiceMinute::from_hm(8, 5));
    assert_eq!(retired[0].arrival, ServiceMinute::from_hm(8, 25));
    assert_eq!(retired[0].origin, "RE");
    assert_eq!(retired[0].destination, "RE");
}

#[test]
fn missing_circulations_yield_no_trips() {
    let s = scenario();
    let catalogue = Catalogue::default();
    let (_, timetable) = plan(&s, &s.cuts, &catalogue, &[(Line::L6, 1)]);
    assert!(timetable.trips.is_empty());
    assert!(timetable.duties().is_empty());
}

const ROSTER: &str = r#"{
    "circulations": [
        {"id":"D103","linia":"S1","inici":"Pl. Catalunya","final":"Terrassa Nacions Unides","sortida":"07:32","arribada":"08:30",
         "estacions":[{"nom":"Sarrià","hora":"07:42"},{"nom":"Rubí Centre","hora":"08:10"}]},
        {"id":"D105","linia":"S1","inici":"Pl. Catalunya","final":"Terrassa Nacions Unides","sortida":"08:02","arribada":"09:00",
         "estacions":[{"nom":"Sarrià","hora":"08:12"},{"nom":"Rubí Centre","hora":"08:40","via":null}]},
        {"id":"D090","linia":"S1","inici":"Terrassa Nacions Unides","final":"Rubí Centre","sortida":"07:20","arribada":"08:00","estacions":null}
    ],
    "shifts": [
        {"id":"QS0400","servei":"S1","inici_torn":"06:00","final_torn":"14:00","duracio":"08:00","dependencia":"Rubí",
         "circulations":["D105"]},
        {"id":"QS0402","servei":"S1","inici_torn":"05:00","final_torn":"09:20","duracio":"04:20","dependencia":"Rubí",
         "circulations":["D090",{"codi":"D120","sortida":"09:30","arribada":"10:20","machinistInici":"Rubí Centre","machinistFinal":"Pl. Catalunya"}]},
        {"id":"QS0405","servei":"S2","inici_torn":"06:00","final_torn":"14:00","duracio":"08:00","dependencia":null,
         "circulations":[{"codi":"Viatger","observacions":"D105-Sabadell"}]},
        {"id":"QS0406","servei":"S1","inici_torn":"06:00","final_torn":"14:00",
         "circulations":[{"codi":"Viatger","observacions":"d103"}]}
    ],
    "daily_assignments": [
        {"torn":"QS0402","nom":"Marc","cognoms":"Vidal"},
        {"torn":"QS0405","nom":"Laia","cognoms":null}
    ]
}"#;

#[test]
fn relief_crews_come_from_the_shift_catalogue() {
    let s: Scenario = serde_json::from_str(ROSTER).unwrap();
    let catalogue = s.catalogue();
    let request = ReliefRequest {
        circulation: "D105",
        station: Some("Rubí"),
        service: None,
    };
    let relief = find_relief(&catalogue, &EngineConfig::default(), &request).unwrap();
    assert_eq!(relief.station, "RB");
    assert_eq!(relief.relief_time, ServiceMinute::from_hm(8, 40));
    assert_eq!(relief.original_shift.as_deref(), Some("QS0400"));

    let passengers = relief.passengers.iter().map(|c| c.shift.as_str()).collect::<Vec<_>>();
    assert_eq!(passengers, vec!["QS0405"]);
    assert_eq!(relief.passengers[0].name.as_deref(), Some("Laia"));
    let previous = relief.previous.as_ref().unwrap();
    assert_eq!(previous.circulation, "D103");
    assert_eq!(previous.crews[0].shift, "QS0406");
    assert!(relief.next.is_none());

    assert_eq!(relief.resting.len(), 1);
    assert_eq!(relief.resting[0].crew.shift, "QS0402");
    assert_eq!(relief.resting[0].crew.name.as_deref(), Some("Vidal, Marc"));
    assert_eq!(relief.extensible.len(), 1);
    assert_eq!(relief.extensible[0].estimated_return, ServiceMinute::from_hm(9, 15));
    assert!(relief.reserves.is_empty());

    let s2_only = ReliefRequest {
        service: Some("S2"),
        ..request
    };
    let relief = find_relief(&catalogue, &EngineConfig::default(), &s2_only).unwrap();
    assert_eq!(relief.passengers.len(), 1);
    assert!(relief.resting.is_empty());
    assert!(relief.previous.unwrap().crews.is_empty());
}
