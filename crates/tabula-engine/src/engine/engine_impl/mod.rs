//! Query state engine operations, split by concern.

mod edits;
mod live;
mod loading;
mod rows;

pub use edits::SaveSummary;
