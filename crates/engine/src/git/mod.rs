// Git plumbing: subprocess worker, versioning-branch publisher, remote probes.

pub mod probe;
pub mod publisher;
pub mod worker;
