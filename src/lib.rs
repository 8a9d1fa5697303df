pub mod gtfs;
pub mod planner;
pub mod prelude;
pub mod repository;
pub mod shared;
