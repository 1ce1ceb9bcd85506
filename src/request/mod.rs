// Allocation and container requests, and their command-line form.

mod assemble;
mod types;

pub use assemble::{AssembledArgs, assemble, bind_args, singularity_args, slurm_args};
pub use types::{AllocationRequest, ContainerRequest};
