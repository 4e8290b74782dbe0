mod date;
mod datetime;
mod duration;
mod time;

pub use date::Date;
pub use datetime::DateTime;
pub use duration::Duration;
pub use time::Time;

#[cfg(test)]
pub use datetime::FIXED_NOW;
