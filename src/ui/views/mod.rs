pub mod detail;
pub mod jobs;
pub mod submissions;
