use std::{cell::RefCell, rc::Rc};

use tracing::{debug, trace, warn};

use crate::{callback::HandlerMut, error::SchedulerError, hal::Clock};

/// Countdown value meaning "no constraint".
pub const MAX_WAIT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(usize);

#[derive(Debug)]
struct Worker {
    name: &'static str,
    callback: HandlerMut<u32>,
    delay_ms: u32,
}

pub struct Scheduler {
    clock: Rc<dyn Clock>,
    workers: Vec<Worker>,
    last_run_ms: Option<u32>,
}

impl Scheduler {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            workers: Vec::new(),
            last_run_ms: None,
        }
    }

    pub fn add_worker<T: 'static>(
        &mut self,
        name: &'static str,
        owner: &Rc<RefCell<T>>,
        method: fn(&mut T, &mut u32),
    ) -> Result<WorkerId, SchedulerError> {
        let mut callback = HandlerMut::new();
        callback.register(owner, method);
        self.push(name, callback)
    }

    pub fn add_worker_fn(
        &mut self,
        name: &'static str,
        callback: impl FnMut(&mut u32) + 'static,
    ) -> Result<WorkerId, SchedulerError> {
        let mut handler = HandlerMut::new();
        handler.register_fn(callback);
        self.push(name, handler)
    }

    fn push(
        &mut self,
        name: &'static str,
        callback: HandlerMut<u32>,
    ) -> Result<WorkerId, SchedulerError> {
        if self.last_run_ms.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let id = WorkerId(self.workers.len());
        self.workers.push(Worker {
            name,
            callback,
            delay_ms: 0,
        });
        debug!(worker = name, index = id.0, "worker registered");
        Ok(id)
    }

    pub fn run_workers(&mut self) -> u32 {
        let now = self.clock.now_ms();
        let elapsed = self
            .last_run_ms
            .map_or(0, |last| now.wrapping_sub(last));
        self.last_run_ms = Some(now);

        let mut next = MAX_WAIT;
        for worker in &mut self.workers {
            if elapsed >= worker.delay_ms {
                worker.delay_ms = MAX_WAIT;
                trace!(worker = worker.name, "running worker");
                worker.callback.invoke(&mut worker.delay_ms);
                if worker.delay_ms == MAX_WAIT {
                    warn!(worker = worker.name, "worker did not request a new delay");
                }
            } else {
                worker.delay_ms -= elapsed;
            }
            next = next.min(worker.delay_ms);
        }
        next
    }

    pub fn remaining_ms(&self, id: WorkerId) -> Option<u32> {
        self.workers.get(id.0).map(|worker| worker.delay_ms)
    }

    pub fn worker_name(&self, id: WorkerId) -> Option<&'static str> {
        self.workers.get(id.0).map(|worker| worker.name)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
