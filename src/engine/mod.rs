pub mod dispatcher;
pub mod event_loop;

pub use dispatcher::{Engine, EngineConfig, OrderIntent, OrderSide};
pub use event_loop::{EventLoop, EventLoopConfig, ExchangeSession, SessionError};
