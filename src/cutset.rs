use crate::error::Error;
use crate::network::StationId;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One of the two directional tracks of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Track {
    One,
    Two,
}

impl FromStr for Track {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "1" | "V1" => Ok(Track::One),
            "2" | "V2" => Ok(Track::Two),
            _ => Err(Error::InvalidTrackCut(s.to_string())),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Track::One => write!(f, "V1"),
            Track::Two => write!(f, "V2"),
        }
    }
}

/// A single cut track, written `FROM-TO-TRACK` on the command line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct TrackCut {
    pub from: StationId,
    pub to: StationId,
    pub track: Track,
}

impl FromStr for TrackCut {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('-').map(|p| p.trim()).collect::<Vec<_>>();
        if parts.len() != 3 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::InvalidTrackCut(s.to_string()));
        }
        Ok(TrackCut {
            from: parts[0].to_uppercase(),
            to: parts[1].to_uppercase(),
            track: parts[2].parse().map_err(|_| Error::InvalidTrackCut(s.to_string()))?,
        })
    }
}

fn segment_key(a: &str, b: &str) -> (StationId, StationId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Operator-declared obstructions. Only the toggle operations write to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(from = "CutList", into = "CutList")]
pub struct CutSet {
    stations: BTreeSet<StationId>,
    tracks: BTreeSet<(StationId, StationId, Track)>,
}

impl CutSet {
    pub fn new() -> CutSet {
        Default::default()
    }

    /// Returns whether the station is cut after the toggle.
    pub fn toggle_station(&mut self, id: &str) -> bool {
        let id = id.trim().to_uppercase();
        if !self.stations.remove(&id) {
            self.stations.insert(id);
            true
        } else {
            false
        }
    }

    /// Returns whether the track is cut after the toggle. The direction in
    /// which the segment is named does not matter.
    pub fn toggle_track(&mut self, from: &str, to: &str, track: Track) -> bool {
        let (a, b) = segment_key(&from.trim().to_uppercase(), &to.trim().to_uppercase());
        let key = (a, b, track);
        if !self.tracks.remove(&key) {
            self.tracks.insert(key);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.stations.clear();
        self.tracks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty() && self.tracks.is_empty()
    }

    pub fn stations(&self) -> &BTreeSet<StationId> {
        &self.stations
    }

    pub fn track_cuts(&self) -> impl Iterator<Item = TrackCut> + '_ {
        self.tracks.iter().map(|(a, b, t)| TrackCut {
            from: a.clone(),
            to: b.clone(),
            track: *t,
        })
    }

    pub fn is_station_cut(&self, id: &str) -> bool {
        self.stations.contains(id)
    }

    pub fn is_track_cut(&self, from: &str, to: &str, track: Track) -> bool {
        let (a, b) = segment_key(from, to);
        self.tracks.contains(&(a, b, track))
    }

    /// Both tracks cut: the segment no longer connects its stations.
    pub fn is_segment_blocked(&self, from: &str, to: &str) -> bool {
        self.is_track_cut(from, to, Track::One) && self.is_track_cut(from, to, Track::Two)
    }

    /// Exactly one track cut: trains still pass, on single-track working.
    pub fn is_segment_degraded(&self, from: &str, to: &str) -> bool {
        self.is_track_cut(from, to, Track::One) != self.is_track_cut(from, to, Track::Two)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct CutList {
    #[serde(default)]
    stations: Vec<StationId>,
    #[serde(default)]
    tracks: Vec<TrackCut>,
}

impl From<CutList> for CutSet {
    fn from(list: CutList) -> Self {
        let mut cuts = CutSet::new();
        for s in list.stations.iter() {
            if !cuts.is_station_cut(&s.to_uppercase()) {
                cuts.toggle_station(s);
            }
        }
        for t in list.tracks.iter() {
            if !cuts.is_track_cut(&t.from.to_uppercase(), &t.to.to_uppercase(), t.track) {
                cuts.toggle_track(&t.from, &t.to, t.track);
            }
        }
        cuts
    }
}

impl From<CutSet> for CutList {
    fn from(cuts: CutSet) -> Self {
        CutList {
            stations: cuts.stations.iter().cloned().collect(),
            tracks: cuts.track_cuts().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_are_involutions() {
        let mut cuts = CutSet::new();
        assert!(cuts.toggle_station("sc"));
        assert!(cuts.is_station_cut("SC"));
        assert!(!cuts.toggle_station("SC"));
        assert!(cuts.is_empty());

        assert!(cuts.toggle_track("SR", "TT", Track::One));
        assert!(cuts.is_track_cut("TT", "SR", Track::One));
        assert!(!cuts.toggle_track("TT", "SR", Track::One));
        assert!(cuts.is_empty());
    }

    #[test]
    fn segment_needs_both_tracks_to_block() {
        let mut cuts = CutSet::new();
        cuts.toggle_track("GR", "SG", Track::One);
        assert!(!cuts.is_segment_blocked("GR", "SG"));
        assert!(cuts.is_segment_degraded("SG", "GR"));
        cuts.toggle_track("SG", "GR", Track::Two);
        assert!(cuts.is_segment_blocked("GR", "SG"));
        assert!(!cuts.is_segment_degraded("GR", "SG"));
        cuts.clear();
        assert!(cuts.is_empty());
    }

    #[test]
    fn parses_track_cuts() {
        let cut: TrackCut = "sc-ms-2".parse().unwrap();
        assert_eq!(cut.from, "SC");
        assert_eq!(cut.to, "MS");
        assert_eq!(cut.track, Track::Two);
        assert_eq!("PC-PR-V1".parse::<TrackCut>().unwrap().track, Track::One);
        assert!("PC-PR".parse::<TrackCut>().is_err());
        assert!("PC-PR-3".parse::<TrackCut>().is_err());
    }

    #[test]
    fn json_round_trip_is_direction_agnostic() {
        let cuts: CutSet = serde_json::from_str(
            r#"{"stations":["SC"],"tracks":[{"from":"MS","to":"SC","track":"One"}]}"#,
        )
        .unwrap();
        assert!(cuts.is_station_cut("SC"));
        assert!(cuts.is_track_cut("SC", "MS", Track::One));
        let json = serde_json::to_string(&cuts).unwrap();
        let back: CutSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cuts);
    }
}
