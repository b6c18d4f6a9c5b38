pub mod dashboard;
pub mod forecast;
pub mod range_cache;
pub mod refresher;
pub mod series;
pub mod telemetry;
pub mod thingspeak;
pub mod window;

#[cfg(test)]
pub(crate) mod test_support;
