pub mod ephemeris;
pub mod meteocat;
