use crate::backend::OpResult;
use crate::instrumentation::InstrumentationHandle;
use crate::types::Code;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduledCommandState {
    Pending,
    Completed(Vec<OpResult>),
    Failed(Code, Vec<OpResult>),
}

/// Bookkeeping of named commands that run after the request that queued them has returned.
pub(crate) struct Scheduler {
    commands: Mutex<HashMap<String, ScheduledCommandState>>,
    instrumentation: InstrumentationHandle,
}

impl Scheduler {
    pub(crate) fn new(instrumentation: InstrumentationHandle) -> Self {
        Scheduler {
            commands: Mutex::new(HashMap::new()),
            instrumentation,
        }
    }

    /// Fails with `NodeExists` while a command of the same name is still pending.
    pub(crate) fn begin(&self, name: &str) -> Result<(), Code> {
        let mut commands = self.commands.lock();
        if commands.get(name) == Some(&ScheduledCommandState::Pending) {
            return Err(Code::NodeExists);
        }
        commands.insert(name.to_string(), ScheduledCommandState::Pending);
        Ok(())
    }

    pub(crate) fn finish(&self, name: &str, code: Code, results: Vec<OpResult>) {
        let state = if code.is_ok() {
            if let Some(sink) = &self.instrumentation {
                sink.on_scheduled_command_completed(name);
            }
            ScheduledCommandState::Completed(results)
        } else {
            if let Some(sink) = &self.instrumentation {
                sink.on_scheduled_command_failed(name);
            }
            ScheduledCommandState::Failed(code, results)
        };
        self.commands.lock().insert(name.to_string(), state);
    }

    pub(crate) fn state(&self, name: &str) -> Option<ScheduledCommandState> {
        self.commands.lock().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_while_pending() {
        let scheduler = Scheduler::new(None);
        scheduler.begin("cleanup").unwrap();
        assert_eq!(scheduler.begin("cleanup"), Err(Code::NodeExists));
        assert_eq!(scheduler.state("cleanup"), Some(ScheduledCommandState::Pending));

        scheduler.finish("cleanup", Code::NoNode, vec![OpResult::Error(Code::NoNode)]);
        assert_eq!(
            scheduler.state("cleanup"),
            Some(ScheduledCommandState::Failed(Code::NoNode, vec![OpResult::Error(Code::NoNode)]))
        );

        scheduler.begin("cleanup").unwrap();
        scheduler.finish("cleanup", Code::Ok, Vec::new());
        assert_eq!(scheduler.state("cleanup"), Some(ScheduledCommandState::Completed(Vec::new())));
        assert_eq!(scheduler.state("other"), None);
    }
}
