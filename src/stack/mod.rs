pub mod graph;
pub mod metadata;
pub mod rescue;
pub mod restack;
pub mod scope;
pub mod store;

pub use graph::{BranchGraph, BranchInfo};
pub use metadata::{BranchRecord, Continuation, UpsertRequest};
pub use rescue::RescueRequest;
pub use restack::{
    BranchOntoRequest, RestackManager, RestackMethod, RestackOptions, RestackRequest,
    RestackResponse,
};
pub use scope::Scope;
pub use store::{BranchTx, Store};
