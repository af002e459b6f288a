// Syncordian - Byzantine fault tolerant collaborative line sequences

pub mod crdt;
pub mod identity;
pub mod net;
pub mod peer;
pub mod supervisor;
