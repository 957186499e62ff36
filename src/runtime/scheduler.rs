//! Cooperative scheduler driving the work queue under a time budget.
//!
//! One [`Run`] exists per batch of descriptions. A run seeds one queue entry
//! per description, then drains the queue one drain pass at a time: each
//! pass pops the highest-priority entry, applies its next instruction, and
//! re-inserts zero, one, or many successors, until nothing is runnable, the
//! wall-clock budget is spent, or the host's interrupt predicate fires.
//! Every pass ends by publishing a snapshot of all values, finished
//! lineages included.

use std::sync::Arc;
use std::time::Instant;

use crate::program::DescriptionSet;
use crate::runtime::domain::{Domain, NoopObserver, Observer, OperationTable};
use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::eval::{Emitted, EvalContext, StepOutcome, step};
use crate::runtime::queue::{Entry, WorkQueue};
use crate::runtime::value::{ForkIndex, Value, ValueSnapshot};
use crate::runtime::EngineConfig;

/// State of every value of a run at the moment a drain pass yielded.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<P> {
    /// Every value of the run: finished lineages first (in completion
    /// order), then pending lineages in priority order.
    pub values: Vec<ValueSnapshot<P>>,
    /// True exactly when nothing is left to compute.
    pub is_final: bool,
}

/// One evaluation run over a batch of descriptions.
pub struct Run<D: Domain>
where
    D::Payload: 'static,
{
    domain: Arc<D>,
    operations: Arc<OperationTable<D::Payload>>,
    descriptions: Arc<DescriptionSet>,
    config: EngineConfig,
    observer: Arc<dyn Observer<D::Payload>>,
    queue: WorkQueue<Entry<D::Payload>>,
    /// Values whose instruction stack emptied; part of every snapshot but
    /// no longer schedulable.
    completed: Vec<Value<D::Payload>>,
}

impl<D> Run<D>
where
    D: Domain + Send + Sync + 'static,
    D::Payload: 'static,
{
    /// Seed a run: one entry per description, rooted at its root noun.
    ///
    /// Fails with [`EvalError::UnknownNoun`] when a description's root noun
    /// is missing from its noun map.
    pub fn new(
        domain: Arc<D>,
        operations: Arc<OperationTable<D::Payload>>,
        descriptions: Arc<DescriptionSet>,
        config: EngineConfig,
    ) -> EvalResult<Self> {
        let compare_domain = Arc::clone(&domain);
        let queue = WorkQueue::new(move |a: &Entry<D::Payload>, b: &Entry<D::Payload>| {
            compare_domain.compare_priority(&a.value.raw, &b.value.raw)
        });
        let mut run = Self {
            domain,
            operations,
            descriptions,
            config,
            observer: Arc::new(NoopObserver),
            queue,
            completed: Vec::new(),
        };
        run.seed()?;
        Ok(run)
    }

    /// Replace the observer receiving evaluation events.
    pub fn with_observer(mut self, observer: Arc<dyn Observer<D::Payload>>) -> Self {
        self.observer = observer;
        self
    }

    fn seed(&mut self) -> EvalResult<()> {
        let domain = Arc::clone(&self.domain);
        for (position, description) in self.descriptions.iter().enumerate() {
            let body = description
                .nouns
                .get(&description.root)
                .ok_or_else(|| EvalError::UnknownNoun {
                    noun: description.root.clone(),
                    description: description.name.clone(),
                })?;
            let value = Value::root(
                domain.create_value(&description.initial_variables),
                ForkIndex::seeded(position as u32),
                description.initial_variables.clone(),
            );
            self.queue.push(Entry::new(value, vec![body.clone()]));
        }
        tracing::debug!(descriptions = self.descriptions.len(), "run seeded");
        Ok(())
    }

    /// Drive the queue until the pass budget is spent, then snapshot.
    ///
    /// The pass runs while a pending entry exists, the elapsed wall-clock
    /// time is under `compute_duration`, and the domain's interrupt
    /// predicate (pass-start progress vs. progress of the entry currently
    /// on top) stays false. Both checks happen only between instructions,
    /// never mid-instruction. Errors abort the run.
    pub fn drain_pass(&mut self) -> EvalResult<Snapshot<D::Payload>> {
        let domain = Arc::clone(&self.domain);
        let operations = Arc::clone(&self.operations);
        let descriptions = Arc::clone(&self.descriptions);
        let observer = Arc::clone(&self.observer);
        let ctx = EvalContext {
            domain: &*domain,
            operations: &*operations,
            descriptions: &*descriptions,
            seed: self.config.seed,
            observer: &*observer,
        };

        let started = Instant::now();
        let baseline = self
            .queue
            .peek()
            .map(|entry| domain.progress(&entry.value.raw));
        let mut steps = 0usize;

        loop {
            let Some(top) = self.queue.peek() else { break };
            if started.elapsed() >= self.config.compute_duration {
                break;
            }
            if let Some(baseline) = &baseline {
                let current = domain.progress(&top.value.raw);
                if domain.should_interrupt(baseline, &current) {
                    break;
                }
            }

            let Some(mut entry) = self.queue.pop() else { break };
            let Some(instruction) = entry.stack.pop() else {
                // Queued entries always carry instructions; a bare value
                // belongs in the completed list.
                self.completed.push(entry.value);
                continue;
            };

            observer.before_apply(&entry.value, &instruction);
            let outcome = step(&ctx, &mut entry.value, &instruction)?;
            observer.after_apply(&entry.value, &instruction);

            match outcome {
                StepOutcome::Branch(children) => {
                    for (k, child) in children.into_iter().enumerate() {
                        let forked = Value {
                            raw: domain.clone_payload(&entry.value.raw),
                            index: entry.value.index.child(k as u32),
                            variables: entry.value.variables.clone(),
                        };
                        let mut stack = entry.stack.clone();
                        stack.push(child);
                        self.queue.push(Entry::new(forked, stack));
                    }
                }
                StepOutcome::Continue { emitted, followups } => {
                    for followup in followups.into_iter().rev() {
                        entry.stack.push(followup);
                    }
                    match emitted {
                        Emitted::Unchanged => self.settle(entry),
                        Emitted::Replace(payload) => {
                            entry.value.raw = payload;
                            self.settle(entry);
                        }
                        Emitted::Fork(payloads) => {
                            for (k, payload) in payloads.into_iter().enumerate() {
                                let forked = Value {
                                    raw: payload,
                                    index: entry.value.index.child(k as u32),
                                    variables: entry.value.variables.clone(),
                                };
                                self.settle(Entry::new(forked, entry.stack.clone()));
                            }
                        }
                    }
                }
            }
            steps += 1;
        }

        tracing::debug!(
            steps,
            pending = self.queue.len(),
            completed = self.completed.len(),
            "drain pass yielded"
        );
        Ok(self.snapshot())
    }

    /// Re-insert an entry with remaining work; retire a finished lineage.
    fn settle(&mut self, entry: Entry<D::Payload>) {
        if entry.completed() {
            self.completed.push(entry.value);
        } else {
            self.queue.push(entry);
        }
    }

    /// Snapshot every value of the run without consuming any instruction.
    ///
    /// Snapshotting is idempotent: two snapshots without intervening
    /// evaluation are identical.
    pub fn snapshot(&self) -> Snapshot<D::Payload> {
        let mut values: Vec<ValueSnapshot<D::Payload>> = self
            .completed
            .iter()
            .map(|value| ValueSnapshot {
                raw: self.domain.clone_payload(&value.raw),
                index: value.index.clone(),
                variables: value.variables.clone(),
                completed: true,
            })
            .collect();
        values.extend(self.queue.iter().map(|entry| ValueSnapshot {
            raw: self.domain.clone_payload(&entry.value.raw),
            index: entry.value.index.clone(),
            variables: entry.value.variables.clone(),
            completed: false,
        }));
        Snapshot {
            values,
            is_final: self.is_final(),
        }
    }

    /// Whether nothing is left to compute.
    pub fn is_final(&self) -> bool {
        self.queue.is_empty()
    }

    /// Progress of the pending entry currently on top, if any.
    pub fn current_progress(&self) -> Option<D::Progress> {
        self.queue
            .peek()
            .map(|entry| self.domain.progress(&entry.value.raw))
    }
}
