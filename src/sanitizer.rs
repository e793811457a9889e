mod clean_string;
mod valid_ign;

pub use clean_string::CleanString;
pub use valid_ign::ValidIGN;
