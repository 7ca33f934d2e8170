//! End-to-end tests: backfill, live cycles, analytics and the
//! dashboard API wired together over real stores.

mod pipeline;
mod scripted_weather;
