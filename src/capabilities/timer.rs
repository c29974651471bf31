//! Delay capability.
//!
//! The shell owns both the clock and the timer queue: a `Delay` request
//! suspends until the requested interval has elapsed and reports the
//! wall-clock time at which it fired. The core uses that timestamp to stamp
//! sessions and alerts, so the app stays deterministic under test (the
//! tester resolves the request with any time it likes).

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::model::UnixTimeMs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum TimerOperation {
    Delay { millis: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TimerOutput {
    Elapsed { now_ms: u64 },
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Capability<Ev> for Timer<Ev> {
    type Operation = TimerOperation;
    type MappedSelf<MappedEv> = Timer<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Timer::new(self.context.map_event(f))
    }
}

impl<Ev> Timer<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }

    /// Fires `make_event` with the shell's wall-clock time once `millis`
    /// have elapsed.
    pub fn delay<F>(&self, millis: u64, make_event: F)
    where
        F: FnOnce(UnixTimeMs) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let TimerOutput::Elapsed { now_ms } =
                ctx.request_from_shell(TimerOperation::Delay { millis }).await;
            ctx.update_app(make_event(UnixTimeMs(now_ms)));
        });
    }
}
