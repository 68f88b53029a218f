pub mod allocate;
pub mod catalogue;
pub mod config;
pub mod cutset;
pub mod error;
pub mod garage;
pub mod network;
pub mod partition;
pub mod pathfind;
pub mod personnel;
pub mod plan;
pub mod relief;
pub mod time;
pub mod timetable;
