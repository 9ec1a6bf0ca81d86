pub mod delivery;
pub mod extractors;
pub mod images;
pub mod uploads;
