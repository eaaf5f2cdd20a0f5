pub mod errors;
pub mod db;
pub mod user_preferences;
pub mod challenge_selection;

#[cfg(test)]
mod tests;
