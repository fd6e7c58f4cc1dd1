mod cost_model;
mod error;
mod input;
mod partitioner;
mod render;
mod report;
mod sampling;

pub use cost_model::CostModel;
pub use error::Error;
pub use input::{FontSpec, Input, InputPost};
pub use partitioner::{
    solve_baseline, solve_heuristic, PartitionInstance, PartitionSoln, Request,
};
pub use render::{FontPartition, SubsetInfo};
pub use report::log_report;
pub use sampling::{build_cost_model, SubsetSource};
