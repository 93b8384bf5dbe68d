pub mod duo;
pub mod duocache;
pub mod duoplanner;
mod duosplit;
pub mod intentledger;
pub mod roles;
pub mod squadphase;
pub mod squadruntime;
pub mod tasks;
