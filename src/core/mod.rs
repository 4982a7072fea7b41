pub mod events;

pub use events::{
    decode, DecodeError, ExecutionUpdate, KlineTick, KlineTicks, OrderId, OrderUpdate,
    PositionUpdate, StreamEvent,
};
