pub mod run;
pub mod score;
pub mod status;
