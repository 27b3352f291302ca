// versioner-engine: the versioning run and its LFS pre/post steps

pub mod config;
pub mod descriptor;
pub mod git;
pub mod github;
pub mod history;
pub mod ledger;
pub mod lfs;
pub mod pipeline;
pub mod snapshot;
