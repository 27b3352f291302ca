// GitHub Actions surface: run context, REST probe, step outputs.

pub mod api;
pub mod context;
pub mod outputs;
