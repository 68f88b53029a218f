use log::*;

use shuttleplan::allocate::{allocate, suggest_assignment, IslandInventory, LineAssignment};
use shuttleplan::catalogue::Scenario;
use shuttleplan::config::EngineConfig;
use shuttleplan::cutset::TrackCut;
use shuttleplan::error::Error;
use shuttleplan::network::{Line, Network};
use shuttleplan::partition::{partition, IslandKey};
use shuttleplan::relief::{find_relief, ReliefRequest};
use shuttleplan::time::{format_opt, ServiceMinute};
use shuttleplan::timetable::{generate, TimetableRequest};
use shuttleplan::{garage, plan};

use std::path::PathBuf;
use std::str::FromStr;
use structopt::StructOpt;

/// Units requested for one line, written `LINE=N`.
#[derive(Debug)]
pub struct LineCount {
    line: Line,
    count: u32,
}

impl FromStr for LineCount {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (line, count) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidLineCount(s.to_string()))?;
        Ok(LineCount {
            line: line.parse()?,
            count: count
                .trim()
                .parse()
                .map_err(|_| Error::InvalidLineCount(s.to_string()))?,
        })
    }
}

/// Circulation whose driver needs relief, written `CODE` or `CODE@STATION`.
#[derive(Debug)]
pub struct ReliefQuery {
    circulation: String,
    station: Option<String>,
}

impl FromStr for ReliefQuery {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (circulation, station) = match s.split_once('@') {
            Some((c, st)) => (c.trim(), Some(st.trim().to_string())),
            None => (s.trim(), None),
        };
        if circulation.is_empty() || station.as_deref() == Some("") {
            return Err(Error::InvalidReliefQuery(s.to_string()));
        }
        Ok(ReliefQuery {
            circulation: circulation.to_string(),
            station,
        })
    }
}

#[derive(Debug, StructOpt)]
#[structopt(name = "shuttleplan", about = "Emergency shuttle planner for a partitioned rail network.")]
struct Opt {
    /// Scenario file: live personnel snapshot, cuts and timetable tables
    #[structopt(name = "FILE")]
    #[structopt(parse(from_os_str))]
    file: PathBuf,

    /// Write the timetable as JSON.
    #[structopt(short)]
    #[structopt(parse(from_os_str))]
    output: Option<PathBuf>,

    /// Activate debug mode
    #[structopt(short, long)]
    verbose: bool,

    /// Engine configuration JSON. Missing fields take their defaults.
    #[structopt(long)]
    #[structopt(parse(from_os_str))]
    config: Option<PathBuf>,

    /// Island to plan: BCN, VALLES, S1, S2, L6 or L7.
    #[structopt(long, default_value = "BCN")]
    island: IslandKey,

    /// Reference time HH:MM. Defaults to the scenario's, then to the local clock.
    #[structopt(long)]
    time: Option<ServiceMinute>,

    /// Fixed headway in minutes for every line.
    #[structopt(long)]
    headway: Option<u32>,

    /// Units per line, e.g. `--line S1=3`. Without any, a default split is suggested.
    #[structopt(long = "line")]
    lines: Vec<LineCount>,

    /// Additional cut station (repeatable).
    #[structopt(long = "cut-station")]
    cut_stations: Vec<String>,

    /// Additional cut track `FROM-TO-TRACK`, e.g. `SR-PF-1` (repeatable).
    #[structopt(long = "cut-track")]
    cut_tracks: Vec<TrackCut>,

    /// Find crews to relieve a circulation's driver, e.g. `D105@Rubí`,
    /// instead of planning shuttles.
    #[structopt(long)]
    relief: Option<ReliefQuery>,

    /// Only search shifts of this service for relief crews.
    #[structopt(long)]
    service: Option<String>,
}

fn wall_clock() -> ServiceMinute {
    use chrono::Timelike;
    let now = chrono::Local::now();
    ServiceMinute::from_hm(now.hour(), now.minute())
}

fn run(opt: Opt) -> Result<(), Error> {
    let config = match &opt.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let scenario = {
        let _h = hprof::enter("read file");
        trace!("Loading scenario {}", opt.file.display());
        Scenario::load(&opt.file)?
    };
    let catalogue = {
        let _h = hprof::enter("parse");
        scenario.catalogue()
    };

    if let Some(query) = &opt.relief {
        let _h = hprof::enter("relief");
        let request = ReliefRequest {
            circulation: &query.circulation,
            station: query.station.as_deref(),
            service: opt.service.as_deref(),
        };
        let relief = find_relief(&catalogue, &config, &request)?;
        println!("{}", plan::print_relief(&relief));
        return Ok(());
    }

    let mut cuts = scenario.cuts.clone();
    for station in opt.cut_stations.iter() {
        if !cuts.is_station_cut(&station.trim().to_uppercase()) {
            cuts.toggle_station(station);
        }
    }
    for cut in opt.cut_tracks.iter() {
        if !cuts.is_track_cut(&cut.from, &cut.to, cut.track) {
            cuts.toggle_track(&cut.from, &cut.to, cut.track);
        }
    }

    let network = Network::commuter();
    let impact = garage::impact(&cuts, &scenario.personnel, &config);
    info!(
        "{} trains at cut stations, about {} passengers stranded",
        impact.trains.len(),
        impact.stranded_passengers
    );
    for status in garage::garage_report(&scenario.personnel) {
        debug!(
            "Garage {}: {} of {} parked",
            status.garage.station, status.parked, status.garage.total
        );
    }

    let partition = {
        let _h = hprof::enter("partition");
        partition(&network, &cuts, &scenario.personnel, &config)
    };
    info!("Islands:\n{}", partition.summary());
    let island = partition.island(opt.island)?;
    let inventory = IslandInventory::from_island(island);

    let assignment = if opt.lines.is_empty() {
        suggest_assignment(&inventory)
    } else {
        let mut assignment = LineAssignment::new(inventory.total_units());
        for lc in opt.lines.iter() {
            if !inventory.supports(lc.line) {
                warn!("{} does not run inside {}", lc.line, island.label);
            }
            assignment.set(lc.line, lc.count)?;
        }
        assignment
    };
    for (line, count) in assignment.iter() {
        debug!("{}: {} units", line, count);
    }
    info!(
        "{} of {} units assigned",
        assignment.total(),
        assignment.capacity()
    );

    {
        let _h = hprof::enter("allocate");
        for service in allocate(&inventory, &assignment) {
            debug!(
                "{} unit {} driver {}",
                service.route,
                service.unit.id,
                service.driver.duty_id().unwrap_or("none")
            );
        }
    }

    let reference = opt
        .time
        .or(scenario.reference_time)
        .unwrap_or_else(wall_clock);
    info!("Planning {} from {}", island.label, reference);

    let timetable = {
        let _h = hprof::enter("generate");
        let request = TimetableRequest {
            inventory: &inventory,
            assignment: &assignment,
            reference,
            cuts: &cuts,
            manual_headway: opt.headway,
        };
        generate(&network, &config, &catalogue, &request)
    };

    for duty in timetable.duty_pool.iter() {
        debug!(
            "Duty {} {}: shift {}-{}, ends at {} free from {}",
            duty.duty_id,
            duty.name,
            format_opt(duty.shift_start),
            duty.shift_end,
            duty.station,
            duty.available_at
        );
    }

    let (board, duties) = plan::print_plan(&timetable);
    println!("{}", board);
    println!("{}", duties);
    if let Some(f) = opt.output {
        plan::write_plan_json(&f, &timetable)?;
        info!("Wrote timetable to file {}", f.display());
    }
    Ok(())
}

fn main() {
    let _h1 = hprof::enter("init");

    let opt = Opt::from_args();
    let level = if opt.verbose {
        if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    } else {
        LevelFilter::Error
    };
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("Could not install logger: {}", e);
    }
    info!("{:#?}", opt);
    drop(_h1);

    let result = run(opt);

    hprof::end_frame();
    hprof::profiler().print_timing();

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
