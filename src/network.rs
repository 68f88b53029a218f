use crate::cutset::CutSet;
use crate::error::Error;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub type StationId = String;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Station {
    pub id: StationId,
    pub label: String,
    pub x: i32,
    pub y: i32,
}

/// A double-track segment between two adjacent stations.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub from: StationId,
    pub to: StationId,
}

#[rustfmt::skip]
const STATIONS: &[(&str, &str, i32, i32)] = &[
    ("PC", "Pl. Catalunya", 20, 100), ("PR", "Provença", 50, 100), ("GR", "Gràcia", 80, 100),
    ("SG", "Sant Gervasi", 110, 100), ("MN", "Muntaner", 140, 100), ("BN", "La Bonanova", 170, 100),
    ("TT", "Les Tres Torres", 200, 100), ("SR", "Sarrià", 230, 100), ("PF", "Peu del Funicular", 260, 100),
    ("VL", "B. Vallvidrera", 290, 100), ("LP", "Les Planes", 320, 100), ("LF", "La Floresta", 350, 100),
    ("VD", "Valldoreix", 380, 100), ("SC", "Sant Cugat", 410, 100), ("PM", "Pl. Molina", 100, 160),
    ("PD", "Pàdua", 130, 160), ("EP", "El Putxet", 160, 160), ("TB", "Av. Tibidabo", 190, 160),
    ("RE", "R. Elisenda", 260, 40), ("MS", "Mira-Sol", 440, 40), ("HG", "Hosp. General", 470, 40),
    ("RB", "Rubí Centre", 500, 40), ("FN", "Les Fonts", 530, 40), ("TR", "Terrassa Rambla", 560, 40),
    ("VP", "Vallparadís", 590, 40), ("EN", "Estació del Nord", 620, 40), ("NA", "Nacions Unides", 650, 40),
    ("VO", "Volpalleres", 440, 160), ("SJ", "Sant Joan", 470, 160), ("BT", "Bellaterra", 500, 160),
    ("UN", "U. Autònoma", 530, 160), ("SQ", "Sant Quirze", 560, 160), ("CF", "Can Feu", 590, 160),
    ("PJ", "Pl. Major", 620, 160), ("CT", "La Creu Alta", 650, 160), ("NO", "Sabadell Nord", 680, 160),
    ("PN", "Parc del Nord", 710, 160),
];

#[rustfmt::skip]
const SEGMENTS: &[(&str, &str)] = &[
    ("PC", "PR"), ("PR", "GR"), ("GR", "SG"), ("SG", "MN"), ("MN", "BN"), ("BN", "TT"), ("TT", "SR"),
    ("SR", "PF"), ("PF", "VL"), ("VL", "LP"), ("LP", "LF"), ("LF", "VD"), ("VD", "SC"),
    ("GR", "PM"), ("PM", "PD"), ("PM", "PD"), ("PD", "EP"), ("EP", "TB"),
    ("SR", "RE"),
    ("SC", "MS"), ("MS", "HG"), ("HG", "RB"), ("RB", "FN"), ("FN", "TR"), ("TR", "VP"), ("VP", "EN"), ("EN", "NA"),
    ("SC", "VO"), ("VO", "SJ"), ("SJ", "BT"), ("BT", "UN"), ("UN", "SQ"), ("SQ", "CF"), ("CF", "PJ"),
    ("PJ", "CT"), ("CT", "NO"), ("NO", "PN"),
];

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Network {
    pub stations: Vec<Station>,
    pub segments: Vec<Segment>,
}

pub type Adjacency = BTreeMap<StationId, Vec<StationId>>;

impl Network {
    pub fn commuter() -> Network {
        Network {
            stations: STATIONS
                .iter()
                .map(|(id, label, x, y)| Station {
                    id: id.to_string(),
                    label: label.to_string(),
                    x: *x,
                    y: *y,
                })
                .collect(),
            segments: SEGMENTS
                .iter()
                .map(|(from, to)| Segment {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
        }
    }

    /// Undirected adjacency list. When a cut set is given, fully cut
    /// segments and every edge touching a cut station are left out. Repeated
    /// segments in the table produce a single edge.
    pub fn adjacency(&self, cuts: Option<&CutSet>) -> Adjacency {
        let mut graph: Adjacency = self
            .stations
            .iter()
            .map(|s| (s.id.clone(), Vec::new()))
            .collect();
        for seg in self.segments.iter() {
            if let Some(cuts) = cuts {
                if cuts.is_segment_blocked(&seg.from, &seg.to)
                    || cuts.is_station_cut(&seg.from)
                    || cuts.is_station_cut(&seg.to)
                {
                    continue;
                }
            }
            let from = graph.entry(seg.from.clone()).or_default();
            if !from.contains(&seg.to) {
                from.push(seg.to.clone());
            }
            let to = graph.entry(seg.to.clone()).or_default();
            if !to.contains(&seg.from) {
                to.push(seg.from.clone());
            }
        }
        graph
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::commuter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Priority {
    High,
    Medium,
}

/// Shuttle lines, declared in allocation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Line {
    L12,
    L6,
    L7,
    S1,
    S2,
}

pub const LINE_ORDER: [Line; 5] = [Line::L12, Line::L6, Line::L7, Line::S1, Line::S2];

const S1_STATIONS: &[&str] = &[
    "PC", "PR", "GR", "SG", "MN", "BN", "TT", "SR", "PF", "VL", "LP", "LF", "VD", "SC", "MS", "HG",
    "RB", "FN", "TR", "VP", "EN", "NA",
];
const S2_STATIONS: &[&str] = &[
    "PC", "PR", "GR", "SG", "MN", "BN", "TT", "SR", "PF", "VL", "LP", "LF", "VD", "SC", "VO", "SJ",
    "BT", "UN", "SQ", "CF", "PJ", "CT", "NO", "PN",
];
const L6_STATIONS: &[&str] = &["PC", "PR", "GR", "SG", "MN", "BN", "TT", "SR"];
const L7_STATIONS: &[&str] = &["PC", "PR", "GR", "PM", "PD", "EP", "TB"];
const L12_STATIONS: &[&str] = &["SR", "RE"];

impl Line {
    pub fn code(self) -> &'static str {
        match self {
            Line::L12 => "L12",
            Line::L6 => "L6",
            Line::L7 => "L7",
            Line::S1 => "S1",
            Line::S2 => "S2",
        }
    }

    /// Accepts the line code or the numeric service code used by the feeds.
    pub fn from_code(code: &str) -> Option<Line> {
        match code.trim().to_uppercase().as_str() {
            "L12" => Some(Line::L12),
            "L6" | "100" => Some(Line::L6),
            "L7" | "300" => Some(Line::L7),
            "S1" | "400" => Some(Line::S1),
            "S2" | "500" => Some(Line::S2),
            _ => None,
        }
    }

    /// Canonical station sequence, ascending direction.
    pub fn stations(self) -> &'static [&'static str] {
        match self {
            Line::L12 => L12_STATIONS,
            Line::L6 => L6_STATIONS,
            Line::L7 => L7_STATIONS,
            Line::S1 => S1_STATIONS,
            Line::S2 => S2_STATIONS,
        }
    }

    pub fn trip_prefix(self) -> char {
        match self {
            Line::L12 => 'L',
            Line::L6 => 'A',
            Line::L7 => 'B',
            Line::S1 => 'D',
            Line::S2 => 'F',
        }
    }

    pub fn priority(self) -> Priority {
        match self {
            Line::S1 | Line::S2 => Priority::High,
            _ => Priority::Medium,
        }
    }

    pub fn rank(self) -> usize {
        LINE_ORDER.iter().position(|l| *l == self).unwrap_or(LINE_ORDER.len())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Line {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Line::from_code(s).ok_or_else(|| Error::UnknownLine(s.to_string()))
    }
}

pub fn line_stations_present(line: Line, stations: &BTreeSet<StationId>) -> bool {
    line.stations().iter().any(|s| stations.contains(*s))
}

// Each rule matches when all of its keywords occur in the folded name.
#[rustfmt::skip]
const NAME_RULES: &[(&[&str], &str)] = &[
    (&["CATALUNYA"], "PC"), (&["PROVEN"], "PR"), (&["GRACIA"], "GR"), (&["GERVASI"], "SG"),
    (&["MUNTANER"], "MN"), (&["BONANOVA"], "BN"), (&["TRES TORRES"], "TT"), (&["SARRIA"], "SR"),
    (&["ELISENDA"], "RE"), (&["TIBIDABO"], "TB"), (&["CUGAT"], "SC"),
    (&["RUBI"], "RB"), (&["TALLER"], "RB"), (&["COTXERA"], "RB"), (&["MERCADERIES"], "RB"),
    (&["RAMAL"], "RB"), (&["APARTADOR"], "RB"),
    (&["RAMBLA"], "TR"), (&["NACIO"], "NA"), (&["UNIDES"], "NA"), (&["FONTS"], "FN"),
    (&["HOSP"], "HG"), (&["GENERAL"], "HG"), (&["MIRA"], "MS"), (&["VALLPARADIS"], "VP"),
    (&["NORD", "ESTACIO"], "EN"),
    (&["VOLPALLERES"], "VO"), (&["JOAN"], "SJ"), (&["BELLATERRA"], "BT"), (&["AUTONOMA"], "UN"),
    (&["UAB"], "UN"), (&["UNIVERSITAT"], "UN"), (&["QUIRZE"], "SQ"), (&["FEU"], "CF"),
    (&["MAJOR"], "PJ"), (&["CREU"], "CT"), (&["SABADELL NORD"], "NO"), (&["PARC"], "PN"),
    (&["MOLINA"], "PM"), (&["PADUA"], "PD"), (&["PUTXET"], "EP"),
    (&["FLORESTA"], "LF"), (&["VALLDOREIX"], "VD"), (&["PLANES"], "LP"), (&["PEU"], "PF"),
    (&["BAIXADOR"], "VL"), (&["VALLVIDRERA"], "VL"),
];

fn fold_diacritic(c: char) -> char {
    match c {
        'À' | 'Á' | 'Â' | 'Ä' => 'A',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'Ò' | 'Ó' | 'Ô' | 'Ö' => 'O',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'Ç' => 'C',
        'Ñ' => 'N',
        c => c,
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .to_uppercase()
        .chars()
        .map(fold_diacritic)
        .collect()
}

/// Resolves a free-text station name (or code) to a station identifier.
///
/// An exact code wins outright. Otherwise every rule whose keywords all occur
/// in the name is a candidate and the one with the longest keyword text wins,
/// earlier rules breaking ties. Unknown names fall back to their first two
/// characters.
pub fn resolve_station_id(name: &str) -> StationId {
    let n = normalize_name(name);
    if NAME_RULES.iter().any(|(_, id)| *id == n) {
        return n;
    }

    let mut best: Option<(usize, &str)> = None;
    for (keywords, id) in NAME_RULES.iter() {
        if keywords.iter().all(|k| n.contains(k)) {
            let specificity = keywords.iter().map(|k| k.len()).sum::<usize>();
            if best.map(|(s, _)| specificity > s).unwrap_or(true) {
                best = Some((specificity, id));
            }
        }
    }
    if let Some((_, id)) = best {
        return id.to_string();
    }

    n.chars().take(2).collect()
}

/// Short form of a duty id as used by the daily crew assignments:
/// `Q` duties of five characters (other than reserve `QR` duties) drop their
/// second character.
pub fn short_duty_id(id: &str) -> String {
    let trimmed = id.trim();
    if trimmed.starts_with('Q') && !trimmed.starts_with("QR") && trimmed.chars().count() == 5 {
        let mut chars = trimmed.chars();
        let first = chars.next().unwrap_or('Q');
        chars.next();
        std::iter::once(first).chain(chars).collect()
    } else {
        trimmed.to_string()
    }
}
