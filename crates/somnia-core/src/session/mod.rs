mod machine;
mod record;

pub use machine::{ActivityEvent, MachineParams, SleepStateMachine, Step};
pub use record::{Activity, Phase, SleepRecord};
