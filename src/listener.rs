//! Progress listener contract and fan-out.
//!
//! Reporters observe a run through [`ProgressListener`]. Every hook defaults to
//! a no-op, so a reporter only implements what it needs. Errors returned by a
//! listener are never swallowed: they stop the run.

use crate::error::{ListenerError, ScenarioFailure, StepError};
use crate::results::{ScenarioResult, StepResult};
use crate::suite::{Scenario, Step, Task};

pub trait ProgressListener {
    fn scenario_started(&mut self, _scenario: &Scenario, _iteration: u32) -> Result<(), ListenerError> {
        Ok(())
    }

    fn scenario_finished(
        &mut self,
        _scenario: &Scenario,
        _iteration: u32,
        _result: &Result<ScenarioResult, ScenarioFailure>,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    fn step_started(
        &mut self,
        _scenario: &Scenario,
        _step_index: usize,
        _step: &Step,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    fn step_finished(
        &mut self,
        _scenario: &Scenario,
        _step_index: usize,
        _step: &Step,
        _result: &Result<StepResult, StepError>,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    fn task_execution_started(&mut self, _tasks: &[Task]) -> Result<(), ListenerError> {
        Ok(())
    }

    fn cleanup_started(&mut self) -> Result<(), ListenerError> {
        Ok(())
    }

    fn cleanup_finished(&mut self) -> Result<(), ListenerError> {
        Ok(())
    }

    fn all_finished(&mut self) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Forwards every hook to each registered listener in registration order.
#[derive(Default)]
pub struct CompositeProgressListener {
    listeners: Vec<Box<dyn ProgressListener>>,
}

impl CompositeProgressListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Box<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn each(
        &mut self,
        mut f: impl FnMut(&mut dyn ProgressListener) -> Result<(), ListenerError>,
    ) -> Result<(), ListenerError> {
        self.listeners.iter_mut().try_for_each(|l| f(l.as_mut()))
    }
}

impl ProgressListener for CompositeProgressListener {
    fn scenario_started(&mut self, scenario: &Scenario, iteration: u32) -> Result<(), ListenerError> {
        self.each(|l| l.scenario_started(scenario, iteration))
    }

    fn scenario_finished(
        &mut self,
        scenario: &Scenario,
        iteration: u32,
        result: &Result<ScenarioResult, ScenarioFailure>,
    ) -> Result<(), ListenerError> {
        self.each(|l| l.scenario_finished(scenario, iteration, result))
    }

    fn step_started(&mut self, scenario: &Scenario, step_index: usize, step: &Step) -> Result<(), ListenerError> {
        self.each(|l| l.step_started(scenario, step_index, step))
    }

    fn step_finished(
        &mut self,
        scenario: &Scenario,
        step_index: usize,
        step: &Step,
        result: &Result<StepResult, StepError>,
    ) -> Result<(), ListenerError> {
        self.each(|l| l.step_finished(scenario, step_index, step, result))
    }

    fn task_execution_started(&mut self, tasks: &[Task]) -> Result<(), ListenerError> {
        self.each(|l| l.task_execution_started(tasks))
    }

    fn cleanup_started(&mut self) -> Result<(), ListenerError> {
        self.each(|l| l.cleanup_started())
    }

    fn cleanup_finished(&mut self) -> Result<(), ListenerError> {
        self.each(|l| l.cleanup_finished())
    }

    fn all_finished(&mut self) -> Result<(), ListenerError> {
        self.each(|l| l.all_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Named {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail_on_cleanup: bool,
    }

    impl ProgressListener for Named {
        fn cleanup_started(&mut self) -> Result<(), ListenerError> {
            self.log.borrow_mut().push(format!("{}:cleanup", self.name));
            if self.fail_on_cleanup {
                return Err(ListenerError::Other(format!("{} broke", self.name)));
            }
            Ok(())
        }

        fn all_finished(&mut self) -> Result<(), ListenerError> {
            self.log.borrow_mut().push(format!("{}:done", self.name));
            Ok(())
        }
    }

    fn composite(log: &Rc<RefCell<Vec<String>>>, failing: Option<&'static str>) -> CompositeProgressListener {
        let mut c = CompositeProgressListener::new();
        for name in ["first", "second", "third"] {
            c.add(Box::new(Named {
                name,
                log: Rc::clone(log),
                fail_on_cleanup: failing == Some(name),
            }));
        }
        c
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut c = composite(&log, None);
        assert_eq!(c.len(), 3);

        c.cleanup_started().unwrap();
        c.all_finished().unwrap();
        // Default hooks are no-ops.
        c.cleanup_finished().unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "first:cleanup",
                "second:cleanup",
                "third:cleanup",
                "first:done",
                "second:done",
                "third:done"
            ]
        );
    }

    #[test]
    fn test_listener_error_is_propagated() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut c = composite(&log, Some("second"));

        let err = c.cleanup_started().unwrap_err();
        assert_eq!(err.to_string(), "second broke");
        assert_eq!(*log.borrow(), vec!["first:cleanup", "second:cleanup"]);
    }
}
