use chrono::NaiveDate;
use shared::{CompletionFact, Task, TaskWithStatus};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::services::period;

/// Completion facts of one user, indexed by task.
///
/// Built once per request from a single batch query so that resolving a
/// whole task list does not go back to the database per task.
#[derive(Debug, Default, Clone)]
pub struct CompletionFacts {
    by_task: HashMap<Uuid, BTreeSet<NaiveDate>>,
}

impl CompletionFacts {
    pub fn new(facts: impl IntoIterator<Item = CompletionFact>) -> Self {
        let mut by_task: HashMap<Uuid, BTreeSet<NaiveDate>> = HashMap::new();
        for fact in facts {
            by_task.entry(fact.task_id).or_default().insert(fact.date);
        }
        Self { by_task }
    }

    pub fn dates_for(&self, task_id: &Uuid) -> Option<&BTreeSet<NaiveDate>> {
        self.by_task.get(task_id)
    }
}

/// Whether the task has a completion in its current period, up to `today`
pub fn is_complete(task: &Task, facts: &CompletionFacts, today: NaiveDate) -> bool {
    let start = period::period_start(today, task.frequency, task.reset_day);

    facts
        .dates_for(&task.id)
        .map(|dates| dates.range(start..=today).next().is_some())
        .unwrap_or(false)
}

pub fn was_completed_on(task_id: &Uuid, date: NaiveDate, facts: &CompletionFacts) -> bool {
    facts
        .dates_for(task_id)
        .map(|dates| dates.contains(&date))
        .unwrap_or(false)
}

/// Attach the derived status to a task.
///
/// With `history_since`, also attaches every completed date from that day up to
/// `today`, each mapped to `true`.
pub fn resolve(
    task: Task,
    facts: &CompletionFacts,
    today: NaiveDate,
    history_since: Option<NaiveDate>,
) -> TaskWithStatus {
    let completed = is_complete(&task, facts, today);
    let period_start = period::period_start(today, task.frequency, task.reset_day);
    let next_period_start = period::next_period_start(today, task.frequency, task.reset_day);

    let history = history_since.map(|since| {
        // Walk the calendar from the first completed day on or after `since`
        let first = facts
            .dates_for(&task.id)
            .and_then(|dates| dates.range(since..).next().copied());

        first
            .map(|first| {
                first
                    .iter_days()
                    .take_while(|day| *day <= today)
                    .filter(|day| was_completed_on(&task.id, *day, facts))
                    .map(|day| (day, true))
                    .collect::<BTreeMap<NaiveDate, bool>>()
            })
            .unwrap_or_default()
    });

    TaskWithStatus {
        task,
        completed,
        period_start,
        next_period_start,
        history,
    }
}
