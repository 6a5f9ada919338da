mod sink;

pub use sink::Instrumentation;
pub use sink::InstrumentationHandle;
