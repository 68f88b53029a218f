use crate::error::Result;
use crate::time::ServiceMinute;
use std::path::Path;

/// Where personnel standing in a station set that no reference island
/// reaches end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnclavePolicy {
    /// Same bucket as personnel standing on a cut station.
    Affected,
    /// A separate "isolated" bucket.
    Isolated,
}

impl Default for EnclavePolicy {
    fn default() -> Self {
        EnclavePolicy::Affected
    }
}

/// Tunables of the planning engine. Every field has a default, so an empty
/// JSON object is a valid configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Minutes of service planned past the reference time when the
    /// historical timetable does not run later.
    #[serde(default = "EngineConfig::default_service_horizon_minutes")]
    pub service_horizon_minutes: u32,
    /// Terminal layover added to two one-way runs to get the cycle time.
    #[serde(default = "EngineConfig::default_turnaround_buffer_minutes")]
    pub turnaround_buffer_minutes: u32,
    /// Rest a driver gets between arriving and the next departure.
    #[serde(default = "EngineConfig::default_driver_turnaround_minutes")]
    pub driver_turnaround_minutes: u32,
    #[serde(default = "EngineConfig::default_min_headway_minutes")]
    pub min_headway_minutes: u32,
    /// Headway floor on a route with single-track working.
    #[serde(default = "EngineConfig::default_degraded_min_headway_minutes")]
    pub degraded_min_headway_minutes: u32,
    /// Extra running time per single-tracked segment on the route.
    #[serde(default = "EngineConfig::default_single_track_penalty_minutes")]
    pub single_track_penalty_minutes: u32,
    #[serde(default = "EngineConfig::default_hop_minutes")]
    pub hop_minutes: u32,
    #[serde(default = "EngineConfig::default_min_path_travel_minutes")]
    pub min_path_travel_minutes: u32,
    /// Used when neither a historical sample nor a path is available.
    #[serde(default = "EngineConfig::default_fallback_travel_minutes")]
    pub fallback_travel_minutes: u32,
    /// No trip departs after this.
    #[serde(default = "EngineConfig::default_daily_cutoff")]
    pub daily_cutoff: ServiceMinute,
    /// Shift end assumed for crews whose shift end is unknown.
    #[serde(default = "EngineConfig::default_daily_cutoff")]
    pub default_shift_end: ServiceMinute,
    #[serde(default = "EngineConfig::default_depot_return_offset_minutes")]
    pub depot_return_offset_minutes: u32,
    #[serde(default = "EngineConfig::default_depot_return_duration_minutes")]
    pub depot_return_duration_minutes: u32,
    #[serde(default = "EngineConfig::default_depot_return_first_number")]
    pub depot_return_first_number: u32,
    #[serde(default = "EngineConfig::default_passengers_per_train")]
    pub passengers_per_train: u32,
    #[serde(default)]
    pub enclave_policy: EnclavePolicy,
    /// Longest shift a relief crew may end up working.
    #[serde(default = "EngineConfig::default_max_shift_minutes")]
    pub max_shift_minutes: u32,
    /// Time a relief crew needs after the relieved run arrives to get back.
    #[serde(default = "EngineConfig::default_relief_return_minutes")]
    pub relief_return_minutes: u32,
    /// Slack around the relief time when matching a crew's rest period.
    #[serde(default = "EngineConfig::default_rest_tolerance_minutes")]
    pub rest_tolerance_minutes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_horizon_minutes: Self::default_service_horizon_minutes(),
            turnaround_buffer_minutes: Self::default_turnaround_buffer_minutes(),
            driver_turnaround_minutes: Self::default_driver_turnaround_minutes(),
            min_headway_minutes: Self::default_min_headway_minutes(),
            degraded_min_headway_minutes: Self::default_degraded_min_headway_minutes(),
            single_track_penalty_minutes: Self::default_single_track_penalty_minutes(),
            hop_minutes: Self::default_hop_minutes(),
            min_path_travel_minutes: Self::default_min_path_travel_minutes(),
            fallback_travel_minutes: Self::default_fallback_travel_minutes(),
            daily_cutoff: Self::default_daily_cutoff(),
            default_shift_end: Self::default_daily_cutoff(),
            depot_return_offset_minutes: Self::default_depot_return_offset_minutes(),
            depot_return_duration_minutes: Self::default_depot_return_duration_minutes(),
            depot_return_first_number: Self::default_depot_return_first_number(),
            passengers_per_train: Self::default_passengers_per_train(),
            enclave_policy: EnclavePolicy::default(),
            max_shift_minutes: Self::default_max_shift_minutes(),
            relief_return_minutes: Self::default_relief_return_minutes(),
            rest_tolerance_minutes: Self::default_rest_tolerance_minutes(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<EngineConfig> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn default_service_horizon_minutes() -> u32 {
        180
    }
    fn default_turnaround_buffer_minutes() -> u32 {
        12
    }
    fn default_driver_turnaround_minutes() -> u32 {
        4
    }
    fn default_min_headway_minutes() -> u32 {
        10
    }
    fn default_degraded_min_headway_minutes() -> u32 {
        20
    }
    fn default_single_track_penalty_minutes() -> u32 {
        3
    }
    fn default_hop_minutes() -> u32 {
        3
    }
    fn default_min_path_travel_minutes() -> u32 {
        8
    }
    fn default_fallback_travel_minutes() -> u32 {
        15
    }
    // 03:00 of the following calendar day.
    fn default_daily_cutoff() -> ServiceMinute {
        ServiceMinute(27 * 60)
    }
    fn default_depot_return_offset_minutes() -> u32 {
        5
    }
    fn default_depot_return_duration_minutes() -> u32 {
        20
    }
    fn default_depot_return_first_number() -> u32 {
        801
    }
    fn default_passengers_per_train() -> u32 {
        120
    }
    // 8 h 45 min.
    fn default_max_shift_minutes() -> u32 {
        525
    }
    fn default_relief_return_minutes() -> u32 {
        15
    }
    fn default_rest_tolerance_minutes() -> u32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.service_horizon_minutes, 180);
        assert_eq!(config.degraded_min_headway_minutes, 20);
        assert_eq!(config.daily_cutoff, ServiceMinute(1620));
        assert_eq!(config.enclave_policy, EnclavePolicy::Affected);
        assert_eq!(config.max_shift_minutes, 525);
        assert_eq!(config.relief_return_minutes, 15);
    }

    #[test]
    fn overrides_single_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"min_headway_minutes": 6, "enclave_policy": "isolated"}"#)
                .unwrap();
        assert_eq!(config.min_headway_minutes, 6);
        assert_eq!(config.turnaround_buffer_minutes, 12);
        assert_eq!(config.enclave_policy, EnclavePolicy::Isolated);
    }
}
