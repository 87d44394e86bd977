//! Concurrent per-icon matching with identity-based fan-in
//!
//! Every icon gets its own blocking worker. Each worker writes exactly once
//! into the slot at its icon's position, and the match set is rebuilt from
//! the slots after all workers have joined, so completion order never leaks
//! into priority order.

use crate::error::{AutomationError, AutomationResult};
use crate::template_matching::{
    Frame, IconId, IconMatcher, IconTemplate, MatchOutcome, MatchResult, MatchSet,
};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// What one worker left behind for the fan-in
#[derive(Debug, Clone)]
struct SlotEntry {
    icon: IconId,
    result: Result<Option<MatchResult>, String>,
}

/// Fixed-size, write-once result slots indexed by icon position
struct ResultSlots {
    slots: Vec<OnceLock<SlotEntry>>,
}

impl ResultSlots {
    fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    fn fill(&self, position: usize, entry: SlotEntry) {
        if let Some(slot) = self.slots.get(position)
            && slot.set(entry).is_err()
        {
            log::error!("❌ Result slot {} written twice, keeping the first", position);
        }
    }

    fn get(&self, position: usize) -> Option<&SlotEntry> {
        self.slots.get(position).and_then(OnceLock::get)
    }
}

pub struct MatchCoordinator {
    matcher: Arc<dyn IconMatcher>,
    icons: Vec<Arc<IconTemplate>>,
}

impl MatchCoordinator {
    /// Icons must be in priority order with ids equal to their positions.
    pub fn new(matcher: Arc<dyn IconMatcher>, icons: Vec<IconTemplate>) -> AutomationResult<Self> {
        if icons.is_empty() {
            return Err(AutomationError::Config(
                "no icon templates to match".to_string(),
            ));
        }
        if let Some((position, icon)) = icons
            .iter()
            .enumerate()
            .find(|(position, icon)| icon.id != IconId(*position))
        {
            return Err(AutomationError::Config(format!(
                "icon '{}' has id {} but sits at priority position {}",
                icon.name, icon.id, position
            )));
        }
        Ok(Self {
            matcher,
            icons: icons.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn icons(&self) -> &[Arc<IconTemplate>] {
        &self.icons
    }

    pub fn icon_name(&self, icon: IconId) -> &str {
        self.icons
            .get(icon.rank())
            .map(|t| t.name.as_str())
            .unwrap_or("unknown")
    }

    /// Match every icon against `frame` concurrently and return one outcome
    /// per icon, in priority order.
    pub async fn run(&self, frame: &Frame) -> MatchSet {
        let start = Instant::now();
        let slots = Arc::new(ResultSlots::new(self.icons.len()));

        let mut workers = Vec::with_capacity(self.icons.len());
        for (position, template) in self.icons.iter().enumerate() {
            let matcher = Arc::clone(&self.matcher);
            let template = Arc::clone(template);
            let gray = Arc::clone(&frame.gray);
            let slots = Arc::clone(&slots);
            let handle = tokio::task::spawn_blocking(move || {
                let result = matcher
                    .match_icon(&template, &gray)
                    .map_err(|e| e.to_string());
                slots.fill(
                    position,
                    SlotEntry {
                        icon: template.id,
                        result,
                    },
                );
            });
            workers.push((position, handle));
        }

        // Full barrier: no outcome is read until every worker has finished
        for (position, handle) in workers {
            if let Err(e) = handle.await {
                let error = AutomationError::MatchWorker {
                    icon: IconId(position),
                    name: self.icon_name(IconId(position)).to_string(),
                    reason: if e.is_panic() {
                        "worker panicked".to_string()
                    } else {
                        e.to_string()
                    },
                };
                log::error!("❌ {}", error);
            }
        }

        let outcomes: Vec<MatchOutcome> = self
            .icons
            .iter()
            .enumerate()
            .map(|(position, template)| self.collect_slot(&slots, position, template))
            .collect();

        let set = MatchSet::from_ordered(outcomes).unwrap_or_else(|| {
            log::error!("❌ Match set tags out of order, treating the tick as empty");
            MatchSet::all_missed(self.icons.len())
        });
        log::debug!(
            "🔍 Matched {} icons in {}ms ({} found)",
            set.len(),
            start.elapsed().as_millis(),
            set.found_count()
        );
        set
    }

    fn collect_slot(
        &self,
        slots: &ResultSlots,
        position: usize,
        template: &IconTemplate,
    ) -> MatchOutcome {
        let no_match = MatchOutcome::NoMatch { icon: template.id };
        let Some(entry) = slots.get(position) else {
            // Worker died before reporting; already logged at the barrier
            return no_match;
        };
        if entry.icon != template.id {
            log::error!(
                "❌ {}",
                AutomationError::MatchWorker {
                    icon: template.id,
                    name: template.name.clone(),
                    reason: format!("slot holds a result tagged {}", entry.icon),
                }
            );
            return no_match;
        }
        match &entry.result {
            Ok(Some(result)) if result.icon == template.id => {
                log::debug!("✅ {}", result.describe(&template.name));
                MatchOutcome::Found(result.clone())
            }
            Ok(Some(result)) => {
                log::error!(
                    "❌ {}",
                    AutomationError::MatchWorker {
                        icon: template.id,
                        name: template.name.clone(),
                        reason: format!("matcher returned a result tagged {}", result.icon),
                    }
                );
                no_match
            }
            Ok(None) => {
                log::debug!("👀 Icon '{}' not found", template.name);
                no_match
            }
            Err(reason) => {
                log::warn!(
                    "⚠️ {}",
                    AutomationError::MatchWorker {
                        icon: template.id,
                        name: template.name.clone(),
                        reason: reason.clone(),
                    }
                );
                no_match
            }
        }
    }
}
