pub mod due;
pub mod files;
pub mod process;
pub mod review;
pub mod show;
pub mod tags;
