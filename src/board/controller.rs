use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::board::undo::{UndoStack, UndoableAction};
use crate::model::command::{MoveDir, Notice, PanelId, UserCommand};
use crate::model::config::{BoardSettings, Capability, PanelConfig};
use crate::model::row::{Row, RowFields, RowKey};
use crate::remote::source::{RemoteOp, RemoteSource};
use crate::remote::worker::{Completion, CompletionBus};
use crate::sync::collection::{CollectionError, OptimisticCollection};
use crate::sync::mode::{ModeTracker, PeriodScheme, ViewMode};
use crate::sync::order::{self, Allocation};
use crate::sync::selection::ViewIdentityTracker;
use crate::sync::writeback::{DebouncedWriteback, PendingWrite};

/// Review-panel state: the FSM tracker plus what the last evaluation said
/// to display.
pub struct ReviewState {
    tracker: ModeTracker,
    pub mode: ViewMode,
    /// Period whose rows are currently displayed.
    pub shown_period: Option<NaiveDate>,
}

impl ReviewState {
    fn new(scheme: PeriodScheme) -> Self {
        ReviewState {
            tracker: ModeTracker::new(scheme),
            mode: ViewMode::Normal,
            shown_period: None,
        }
    }

    pub fn scheme(&self) -> PeriodScheme {
        self.tracker.scheme()
    }
}

/// One panel: its collection, selection, source, and refresh bookkeeping.
pub struct Panel {
    pub config: PanelConfig,
    source: Arc<dyn RemoteSource>,
    pub collection: OptimisticCollection,
    pub selection: ViewIdentityTracker,
    /// Generation of the newest fetch started; completions from older
    /// generations are discarded (last writer wins).
    fetch_started: u64,
    pub review: Option<ReviewState>,
}

impl Panel {
    fn new(config: PanelConfig, source: Arc<dyn RemoteSource>) -> Self {
        let review = config.period.map(|kind| ReviewState::new(kind.into()));
        let collection = OptimisticCollection::new(config.groups.clone());
        Panel {
            config,
            source,
            collection,
            selection: ViewIdentityTracker::new(),
            fetch_started: 0,
            review,
        }
    }

    /// Rows to display: everything, except the review panel shows only its
    /// active period.
    pub fn display_rows(&self) -> Vec<&Row> {
        display_rows_of(&self.collection, &self.review)
    }

    /// Re-attach the cursor to the display list. Called after every
    /// structural change; index stability is never assumed.
    pub fn reattach_selection(&mut self) -> Option<usize> {
        let rows = display_rows_of(&self.collection, &self.review);
        self.selection.reattach(&rows)
    }
}

fn display_rows_of<'a>(
    collection: &'a OptimisticCollection,
    review: &Option<ReviewState>,
) -> Vec<&'a Row> {
    match review {
        Some(review) => {
            let Some(period) = review.shown_period else {
                return Vec::new();
            };
            let group = period.to_string();
            collection
                .rows()
                .iter()
                .filter(|r| r.group == group)
                .collect()
        }
        None => collection.rows().iter().collect(),
    }
}

/// What to do when an in-flight remote call completes.
enum InFlightKind {
    /// Optimistic field/state mutation: confirm and push the undo action,
    /// or roll back to the snapshot.
    Mutation {
        snapshot: Row,
        undo: Option<UndoableAction>,
        success: String,
        /// Row changed group; reposition after a rollback.
        reseat: bool,
    },
    /// Optimistic removal: reinsert on failure.
    Removal {
        index: usize,
        row: Row,
        success: String,
    },
    /// An executed undo: rolling IT back restores the pre-undo state.
    Inverse {
        snapshot: Row,
        reseat: bool,
        description: String,
    },
    /// A debounced reorder write: push the undo action on success, refresh
    /// on failure (partial remote order state is unknown).
    Reorder {
        previous_order: f64,
        description: String,
    },
    /// Order-maintenance write (group renumbering): refresh on failure.
    Maintenance,
}

struct InFlight {
    panel: PanelId,
    key: RowKey,
    kind: InFlightKind,
}

/// The root of the command layer. Owns one panel per configuration entry
/// and routes every user command and every remote completion; all calls
/// happen on one control flow.
pub struct Controller {
    panels: IndexMap<PanelId, Panel>,
    undo: UndoStack,
    writeback: DebouncedWriteback,
    bus: CompletionBus,
    in_flight: HashMap<u64, InFlight>,
    next_request: u64,
    temp_counter: u64,
    notices: VecDeque<Notice>,
    refresh_interval: Duration,
    last_refresh: Option<Instant>,
}

impl Controller {
    pub fn new(settings: &BoardSettings) -> Self {
        Controller {
            panels: IndexMap::new(),
            undo: UndoStack::new(settings.undo_limit),
            writeback: DebouncedWriteback::new(Duration::from_millis(settings.debounce_ms)),
            bus: CompletionBus::new(),
            in_flight: HashMap::new(),
            next_request: 0,
            temp_counter: 0,
            notices: VecDeque::new(),
            refresh_interval: Duration::from_secs(settings.refresh_secs),
            last_refresh: None,
        }
    }

    pub fn add_panel(&mut self, config: PanelConfig, source: Arc<dyn RemoteSource>) {
        let id = PanelId::new(config.id.clone());
        self.panels.insert(id, Panel::new(config, source));
    }

    pub fn panel_ids(&self) -> Vec<PanelId> {
        self.panels.keys().cloned().collect()
    }

    pub fn panel(&self, id: &PanelId) -> Option<&Panel> {
        self.panels.get(id)
    }

    pub fn selection_key(&self, id: &PanelId) -> Option<&RowKey> {
        self.panels.get(id)?.selection.selected_key()
    }

    pub fn undo_is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    pub fn refresh_all(&mut self, now: Instant) {
        self.last_refresh = Some(now);
        let ids = self.panel_ids();
        for id in ids {
            self.refresh_panel(&id);
        }
    }

    fn refresh_panel(&mut self, id: &PanelId) {
        let Some(panel) = self.panels.get_mut(id) else {
            return;
        };
        panel.fetch_started += 1;
        self.bus
            .spawn_fetch(id.clone(), panel.fetch_started, panel.source.clone());
    }

    // -----------------------------------------------------------------------
    // Tick: timers, debounce firing, review FSM
    // -----------------------------------------------------------------------

    /// Drive everything clock-based. Called on every event-loop pass with
    /// the current monotonic instant and wall-clock date.
    pub fn tick(&mut self, now: Instant, today: NaiveDate) {
        match self.last_refresh {
            None => self.refresh_all(now),
            Some(last) if now.duration_since(last) >= self.refresh_interval => {
                self.refresh_all(now)
            }
            Some(_) => {}
        }

        for (panel_id, write) in self.writeback.due(now) {
            self.fire_writeback(&panel_id, write);
        }

        self.evaluate_review(today);
    }

    fn fire_writeback(&mut self, panel_id: &PanelId, write: PendingWrite) {
        let Some(panel) = self.panels.get_mut(panel_id) else {
            return;
        };
        // Re-validate against current state: the request may be stale.
        let Some(row) = panel.collection.get(&write.key) else {
            tracing::debug!(panel = %panel_id, row = %write.key, "reorder target gone, refreshing");
            self.refresh_panel(panel_id);
            return;
        };
        if row.group != write.group {
            tracing::debug!(panel = %panel_id, row = %write.key, "reorder target regrouped, refreshing");
            self.refresh_panel(panel_id);
            return;
        }
        let Some(remote_id) = row.remote_id.clone() else {
            // Still awaiting creation; keep the write queued until the temp
            // key is promoted.
            let now = write.deadline();
            self.writeback.schedule(
                panel_id,
                write.key.clone(),
                write.group.clone(),
                write.order_before,
                now,
            );
            return;
        };
        let title = row.fields.title.clone();
        let Some((orders, pos)) = panel.collection.group_orders(&write.key) else {
            return;
        };
        match order::allocate(&orders, pos) {
            Allocation::At(new_order) => {
                panel.collection.set_order(&write.key, new_order);
                let request = self.next_request;
                self.next_request += 1;
                self.in_flight.insert(
                    request,
                    InFlight {
                        panel: panel_id.clone(),
                        key: write.key.clone(),
                        kind: InFlightKind::Reorder {
                            previous_order: write.order_before,
                            description: format!("Move: {}", short(&title)),
                        },
                    },
                );
                self.bus.spawn_mutate(
                    panel_id.clone(),
                    request,
                    write.key.clone(),
                    remote_id,
                    panel.source.clone(),
                    RemoteOp::SetOrder { order: new_order },
                );
            }
            Allocation::Renumber => {
                tracing::info!(panel = %panel_id, group = %write.group, "order keys exhausted, renumbering group");
                let writes = panel.collection.renumber_group(&write.group);
                let source = panel.source.clone();
                for (key, new_order) in writes {
                    let Some(rid) = panel.collection.get(&key).and_then(|r| r.remote_id.clone())
                    else {
                        continue;
                    };
                    let request = self.next_request;
                    self.next_request += 1;
                    self.in_flight.insert(
                        request,
                        InFlight {
                            panel: panel_id.clone(),
                            key: key.clone(),
                            kind: InFlightKind::Maintenance,
                        },
                    );
                    self.bus.spawn_mutate(
                        panel_id.clone(),
                        request,
                        key,
                        rid,
                        source.clone(),
                        RemoteOp::SetOrder { order: new_order },
                    );
                }
            }
        }
    }

    fn evaluate_review(&mut self, today: NaiveDate) {
        let mut prompt_text = None;
        for panel in self.panels.values_mut() {
            let Some(review) = panel.review.as_mut() else {
                continue;
            };
            let scheme = review.tracker.scheme();
            let current = scheme.start_of(today);
            let previous = scheme.previous_start(today);
            let has = |period: NaiveDate| {
                let group = period.to_string();
                panel.collection.rows().iter().any(|r| r.group == group)
            };
            let decision = review.tracker.evaluate(today, has(current), has(previous));
            review.mode = decision.mode;
            review.shown_period = Some(match decision.mode {
                ViewMode::Normal => current,
                ViewMode::ReviewPrevious => previous,
            });
            if decision.prompt {
                prompt_text = Some(format!(
                    "{}: a new period started — reviewing the previous one",
                    panel.config.title
                ));
            }
        }
        if let Some(text) = prompt_text {
            self.notify(Notice::info(text));
        }
    }

    // -----------------------------------------------------------------------
    // Command dispatch
    // -----------------------------------------------------------------------

    /// Route one user command. Local validation happens before any
    /// mutation; a command whose target row vanished is a silent no-op.
    pub fn dispatch(&mut self, cmd: UserCommand, now: Instant, today: NaiveDate) {
        match cmd {
            UserCommand::Create { panel, title, due } => self.create(&panel, title, due, today),
            UserCommand::Complete { panel } => self.complete(&panel),
            UserCommand::Defer { panel } => self.defer(&panel, today),
            UserCommand::Delete { panel } => self.delete(&panel),
            UserCommand::Move { panel, dir } => self.move_selected(&panel, dir, now),
            UserCommand::SetState { panel, state } => self.set_state(&panel, state),
            UserCommand::Assign { panel, assignee } => self.assign(&panel, assignee),
            UserCommand::Abandon { panel } => self.abandon(&panel),
            UserCommand::Undo => self.undo_last(),
            UserCommand::Refresh => {
                self.refresh_all(now);
                self.notify(Notice::info("Refreshing..."));
            }
            UserCommand::DismissReview => self.dismiss_review(today),
            UserCommand::Select { panel, key } => {
                if let Some(p) = self.panels.get_mut(&panel) {
                    let index = key
                        .as_ref()
                        .and_then(|k| p.display_rows().iter().position(|r| &r.key == k))
                        .unwrap_or(0);
                    p.selection.select(key, index);
                }
            }
        }
    }

    /// Move the panel's cursor by `delta` display rows.
    pub fn move_selection(&mut self, panel_id: &PanelId, delta: isize) {
        let Some(panel) = self.panels.get_mut(panel_id) else {
            return;
        };
        let rows = panel.display_rows();
        if rows.is_empty() {
            return;
        }
        let current = panel
            .selection
            .selected_key()
            .and_then(|k| rows.iter().position(|r| &r.key == k))
            .unwrap_or(0);
        let target = current
            .saturating_add_signed(delta)
            .min(rows.len() - 1);
        let key = rows[target].key.clone();
        panel.selection.select(Some(key), target);
    }

    /// Check capability and selection, returning the selected row's key.
    /// Emits a notice for unsupported operations; a missing or stale
    /// selection is silent.
    fn selected_for(&mut self, panel_id: &PanelId, cap: Capability) -> Option<RowKey> {
        let panel = self.panels.get(panel_id)?;
        if !panel.config.supports(cap) {
            let title = panel.config.title.clone();
            self.notify(Notice::warning(format!(
                "{} does not support that operation",
                title
            )));
            return None;
        }
        let panel = self.panels.get(panel_id)?;
        let key = panel.selection.selected_key()?.clone();
        if panel.collection.get(&key).is_none() {
            tracing::debug!(panel = %panel_id, row = %key, "command target no longer present");
            return None;
        }
        Some(key)
    }

    fn create(&mut self, panel_id: &PanelId, title: String, due: Option<NaiveDate>, today: NaiveDate) {
        let title = title.trim().to_string();
        if title.is_empty() {
            self.notify(Notice::warning("Title cannot be empty"));
            return;
        }
        let Some(panel) = self.panels.get(panel_id) else {
            return;
        };
        if !panel.config.supports(Capability::Create) {
            let t = panel.config.title.clone();
            self.notify(Notice::warning(format!("{} does not support creating rows", t)));
            return;
        }

        // Creation always targets the current period / the selection's
        // group; creating during review starts the new period.
        let group = match &panel.review {
            Some(review) => review.scheme().start_of(today).to_string(),
            None => panel
                .selection
                .selected_key()
                .and_then(|k| panel.collection.get(k))
                .map(|r| r.group.clone())
                .or_else(|| panel.config.groups.first().cloned())
                .unwrap_or_default(),
        };
        let order = panel
            .collection
            .rows()
            .iter()
            .filter(|r| r.group == group)
            .map(|r| r.order)
            .fold(None::<f64>, |max, o| Some(max.map_or(o, |m| m.max(o))))
            .map_or(1.0, |m| m + 1.0);

        self.temp_counter += 1;
        let temp = RowKey::temp(self.temp_counter);
        let mut fields = RowFields::titled(title);
        fields.due_date = due;
        if panel.review.is_none() && !group.is_empty() {
            fields.status = group.clone();
        }

        let Some(panel) = self.panels.get_mut(panel_id) else {
            return;
        };
        let row = Row::new(temp.clone(), group.clone(), order, fields.clone());
        panel.collection.insert_pending(panel.collection.len(), row);
        let index = panel
            .collection
            .reposition(&temp)
            .unwrap_or(panel.collection.len() - 1);
        panel.selection.select(Some(temp.clone()), index);

        let source = panel.source.clone();
        self.bus
            .spawn_create(panel_id.clone(), temp, source, fields, group, order);
    }

    fn complete(&mut self, panel_id: &PanelId) {
        let Some(key) = self.selected_for(panel_id, Capability::Complete) else {
            return;
        };
        let description = self.describe(panel_id, &key, "Complete");
        self.mutate_selected(
            panel_id,
            &key,
            |r| r.fields.done = true,
            RemoteOp::Complete,
            Some(UndoableAction::Complete {
                panel: panel_id.clone(),
                key: key.clone(),
                description,
            }),
            "Completed",
            false,
        );
    }

    fn defer(&mut self, panel_id: &PanelId, today: NaiveDate) {
        let Some(key) = self.selected_for(panel_id, Capability::Defer) else {
            return;
        };
        let previous_due = self
            .panels
            .get(panel_id)
            .and_then(|p| p.collection.get(&key))
            .and_then(|r| r.fields.due_date);
        let next = crate::sync::mode::next_working_day(today);
        let description = self.describe(panel_id, &key, "Defer");
        self.mutate_selected(
            panel_id,
            &key,
            move |r| r.fields.due_date = Some(next),
            RemoteOp::SetDue { date: Some(next) },
            Some(UndoableAction::Defer {
                panel: panel_id.clone(),
                key: key.clone(),
                previous_due,
                description,
            }),
            "Deferred to next working day",
            false,
        );
    }

    fn delete(&mut self, panel_id: &PanelId) {
        let Some(key) = self.selected_for(panel_id, Capability::Delete) else {
            return;
        };
        let Some(panel) = self.panels.get_mut(panel_id) else {
            return;
        };
        let Some(row) = panel.collection.get(&key) else {
            return;
        };
        if row.pending {
            self.notify(Notice::warning("Row has a change in flight"));
            return;
        }
        let Some(remote_id) = row.remote_id.clone() else {
            self.notify(Notice::warning("Row is not confirmed yet"));
            return;
        };
        let Some((index, removed)) = panel.collection.remove(&key) else {
            return;
        };
        // A pending reorder for this row would target a ghost.
        if self
            .writeback
            .pending_for(panel_id)
            .is_some_and(|w| w.key == key)
        {
            self.writeback.cancel(panel_id);
        }
        panel.reattach_selection();

        let request = self.next_request;
        self.next_request += 1;
        self.in_flight.insert(
            request,
            InFlight {
                panel: panel_id.clone(),
                key: key.clone(),
                kind: InFlightKind::Removal {
                    index,
                    row: removed,
                    success: "Deleted".to_string(),
                },
            },
        );
        let source = self.panels[panel_id].source.clone();
        self.bus
            .spawn_mutate(panel_id.clone(), request, key, remote_id, source, RemoteOp::Delete);
    }

    fn move_selected(&mut self, panel_id: &PanelId, dir: MoveDir, now: Instant) {
        let Some(key) = self.selected_for(panel_id, Capability::Move) else {
            return;
        };
        let Some(panel) = self.panels.get_mut(panel_id) else {
            return;
        };
        if let Some(review) = &panel.review
            && review.mode == ViewMode::ReviewPrevious
        {
            self.notify(Notice::warning("Previous period is read-only"));
            return;
        }
        let delta = match dir {
            MoveDir::Up => -1,
            MoveDir::Down => 1,
        };
        let Some(outcome) = panel.collection.move_row(&key, delta) else {
            return;
        };
        let group = panel
            .collection
            .get(&key)
            .map(|r| r.group.clone())
            .unwrap_or_default();
        panel.selection.select(Some(key.clone()), outcome.new_index);
        self.writeback
            .schedule(panel_id, key, group, outcome.order_before, now);
    }

    fn set_state(&mut self, panel_id: &PanelId, state: String) {
        let Some(key) = self.selected_for(panel_id, Capability::Setstate) else {
            return;
        };
        let previous_state = match self.panels.get(panel_id).and_then(|p| p.collection.get(&key)) {
            Some(row) if row.group != state => row.group.clone(),
            _ => return,
        };
        let description = format!("Set {} to {}", key, state);
        let new_state = state.clone();
        self.mutate_selected(
            panel_id,
            &key,
            move |r| {
                r.group = new_state.clone();
                r.fields.status = new_state.clone();
            },
            RemoteOp::SetState { state: state.clone() },
            Some(UndoableAction::SetState {
                panel: panel_id.clone(),
                key: key.clone(),
                previous_state,
                description,
            }),
            "State updated",
            true,
        );
    }

    fn assign(&mut self, panel_id: &PanelId, assignee: Option<String>) {
        let Some(key) = self.selected_for(panel_id, Capability::Assign) else {
            return;
        };
        let previous_assignee = self
            .panels
            .get(panel_id)
            .and_then(|p| p.collection.get(&key))
            .and_then(|r| r.fields.assignee.clone());
        let verb = if assignee.is_some() { "Assign" } else { "Unassign" };
        let description = format!("{} {}", verb, key);
        let success = if assignee.is_some() { "Assigned" } else { "Unassigned" };
        let new_assignee = assignee.clone();
        self.mutate_selected(
            panel_id,
            &key,
            move |r| r.fields.assignee = new_assignee.clone(),
            RemoteOp::Assign { assignee },
            Some(UndoableAction::Assign {
                panel: panel_id.clone(),
                key: key.clone(),
                previous_assignee,
                description,
            }),
            success,
            false,
        );
    }

    fn abandon(&mut self, panel_id: &PanelId) {
        let Some(key) = self.selected_for(panel_id, Capability::Abandon) else {
            return;
        };
        let already_abandoned = match self.panels.get(panel_id).and_then(|p| p.collection.get(&key))
        {
            Some(row) => row.fields.abandoned,
            None => return,
        };
        if already_abandoned {
            // Restoring an abandoned row is itself not undoable.
            self.mutate_selected(
                panel_id,
                &key,
                |r| r.fields.abandoned = false,
                RemoteOp::Restore,
                None,
                "Restored",
                false,
            );
        } else {
            let description = self.describe(panel_id, &key, "Abandon");
            self.mutate_selected(
                panel_id,
                &key,
                |r| r.fields.abandoned = true,
                RemoteOp::Abandon,
                Some(UndoableAction::Abandon {
                    panel: panel_id.clone(),
                    key: key.clone(),
                    description,
                }),
                "Abandoned",
                false,
            );
        }
    }

    fn dismiss_review(&mut self, today: NaiveDate) {
        for panel in self.panels.values_mut() {
            if let Some(review) = panel.review.as_mut()
                && review.mode == ViewMode::ReviewPrevious
            {
                review.tracker.dismiss(today);
            }
        }
        self.evaluate_review(today);
    }

    /// "Verb: truncated row title" for undo descriptions and notices.
    fn describe(&self, panel_id: &PanelId, key: &RowKey, verb: &str) -> String {
        let title = self
            .panels
            .get(panel_id)
            .and_then(|p| p.collection.get(key))
            .map(|r| r.fields.title.as_str())
            .unwrap_or("");
        format!("{}: {}", verb, short(title))
    }

    /// Shared optimistic-mutation path: apply locally, mark pending, issue
    /// the write, remember how to confirm or roll back.
    #[allow(clippy::too_many_arguments)]
    fn mutate_selected(
        &mut self,
        panel_id: &PanelId,
        key: &RowKey,
        transform: impl FnOnce(&mut Row),
        op: RemoteOp,
        undo: Option<UndoableAction>,
        success: &str,
        reseat: bool,
    ) {
        let Some(panel) = self.panels.get_mut(panel_id) else {
            return;
        };
        let Some(remote_id) = panel.collection.get(key).and_then(|r| r.remote_id.clone()) else {
            self.notify(Notice::warning("Row is not confirmed yet"));
            return;
        };
        let snapshot = match panel.collection.mutate(key, transform) {
            Ok(snapshot) => snapshot,
            Err(CollectionError::Busy(_)) => {
                self.notify(Notice::warning("Row has a change in flight"));
                return;
            }
            Err(CollectionError::NotFound(_)) => return,
        };
        if reseat {
            panel.collection.reposition(key);
            panel.reattach_selection();
        }

        let request = self.next_request;
        self.next_request += 1;
        self.in_flight.insert(
            request,
            InFlight {
                panel: panel_id.clone(),
                key: key.clone(),
                kind: InFlightKind::Mutation {
                    snapshot,
                    undo,
                    success: success.to_string(),
                    reseat,
                },
            },
        );
        let source = self.panels[panel_id].source.clone();
        self.bus
            .spawn_mutate(panel_id.clone(), request, key.clone(), remote_id, source, op);
    }

    // -----------------------------------------------------------------------
    // Undo
    // -----------------------------------------------------------------------

    fn undo_last(&mut self) {
        let Some(action) = self.undo.pop() else {
            self.notify(Notice::warning("Nothing to undo"));
            return;
        };
        let panel_id = action.panel().clone();
        let key = action.key().clone();
        let Some(panel) = self.panels.get_mut(&panel_id) else {
            return;
        };
        let Some(row) = panel.collection.get(&key) else {
            // The row is gone; the action is spent either way.
            tracing::debug!(panel = %panel_id, row = %key, "undo target no longer present");
            return;
        };
        let Some(remote_id) = row.remote_id.clone() else {
            return;
        };
        let op = action.inverse_op();
        let reseat = matches!(
            action,
            UndoableAction::SetState { .. } | UndoableAction::Reorder { .. }
        );
        let description = action.description().to_string();
        let snapshot = match panel.collection.mutate(&key, |r| apply_inverse(r, &action)) {
            Ok(snapshot) => snapshot,
            Err(CollectionError::Busy(_)) => {
                self.notify(Notice::warning("Row has a change in flight"));
                return;
            }
            Err(CollectionError::NotFound(_)) => return,
        };
        if reseat {
            panel.collection.reposition(&key);
            panel.reattach_selection();
        }

        let request = self.next_request;
        self.next_request += 1;
        self.in_flight.insert(
            request,
            InFlight {
                panel: panel_id.clone(),
                key: key.clone(),
                kind: InFlightKind::Inverse {
                    snapshot,
                    reseat,
                    description,
                },
            },
        );
        let source = self.panels[&panel_id].source.clone();
        self.bus
            .spawn_mutate(panel_id, request, key, remote_id, source, op);
    }

    // -----------------------------------------------------------------------
    // Completion handling
    // -----------------------------------------------------------------------

    /// Drain and apply every completion that has arrived. Called from the
    /// event loop; this is the only place worker results touch state.
    pub fn pump_completions(&mut self) -> usize {
        let completions = self.bus.poll();
        let count = completions.len();
        for completion in completions {
            self.apply_completion(completion);
        }
        count
    }

    fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched {
                panel,
                generation,
                result,
            } => self.on_fetched(&panel, generation, result),
            Completion::Created {
                panel,
                temp_key,
                result,
            } => self.on_created(&panel, temp_key, result),
            Completion::Mutated {
                panel,
                request,
                key,
                result,
                ..
            } => self.on_mutated(&panel, request, key, result),
        }
    }

    fn on_fetched(
        &mut self,
        panel_id: &PanelId,
        generation: u64,
        result: Result<Vec<crate::remote::source::RawItem>, crate::remote::source::RemoteError>,
    ) {
        let Some(panel) = self.panels.get_mut(panel_id) else {
            return;
        };
        if generation != panel.fetch_started {
            tracing::debug!(panel = %panel_id, generation, newest = panel.fetch_started, "discarding stale refresh");
            return;
        }
        match result {
            Ok(items) => {
                let rows: Vec<Row> = items
                    .into_iter()
                    .map(|item| Row {
                        key: RowKey::new(item.remote_id.clone()),
                        remote_id: Some(item.remote_id),
                        group: item.group,
                        order: item.order,
                        fields: item.fields,
                        pending: false,
                    })
                    .collect();
                panel.collection.replace_all(rows);
                panel.reattach_selection();
            }
            Err(e) => {
                let title = panel.config.title.clone();
                self.notify(Notice::warning(format!("{}: refresh failed ({})", title, e)));
            }
        }
    }

    fn on_created(
        &mut self,
        panel_id: &PanelId,
        temp_key: RowKey,
        result: Result<String, crate::remote::source::RemoteError>,
    ) {
        let Some(panel) = self.panels.get_mut(panel_id) else {
            return;
        };
        match result {
            Ok(remote_id) => {
                let real = RowKey::new(remote_id.clone());
                // One synchronous step: the collection, the pending
                // debounce target, and the selection all retarget together,
                // so nothing can observe the old identity in between.
                if panel.collection.promote(&temp_key, real.clone(), remote_id) {
                    panel.selection.retarget(&temp_key, &real);
                    self.writeback.retarget(panel_id, &temp_key, &real);
                    self.notify(Notice::info("Created"));
                } else {
                    tracing::debug!(panel = %panel_id, row = %temp_key, "created row vanished before promotion");
                }
            }
            Err(e) => {
                panel.collection.remove(&temp_key);
                if self
                    .writeback
                    .pending_for(panel_id)
                    .is_some_and(|w| w.key == temp_key)
                {
                    self.writeback.cancel(panel_id);
                }
                if let Some(panel) = self.panels.get_mut(panel_id) {
                    panel.reattach_selection();
                }
                self.notify(Notice::error(format!("Create failed: {}", e)));
            }
        }
    }

    fn on_mutated(
        &mut self,
        panel_id: &PanelId,
        request: u64,
        key: RowKey,
        result: Result<(), crate::remote::source::RemoteError>,
    ) {
        let Some(entry) = self.in_flight.remove(&request) else {
            tracing::debug!(panel = %panel_id, row = %key, request, "completion without in-flight entry");
            return;
        };
        let Some(panel) = self.panels.get_mut(&entry.panel) else {
            return;
        };
        match entry.kind {
            InFlightKind::Mutation {
                snapshot,
                undo,
                success,
                reseat,
            } => {
                if result.is_ok() {
                    panel.collection.confirm(&entry.key);
                    if let Some(action) = undo {
                        self.undo.push(action);
                    }
                    self.notify(Notice::info(success));
                } else {
                    // A refresh that superseded the row already reconciled
                    // it; only a still-pending row gets the rollback.
                    if panel.collection.get(&entry.key).is_some_and(|r| r.pending) {
                        panel.collection.rollback(&entry.key, snapshot);
                        if reseat {
                            panel.collection.reposition(&entry.key);
                        }
                        panel.reattach_selection();
                    }
                    if let Err(e) = result {
                        self.notify(Notice::error(format!("Change failed: {}", e)));
                    }
                }
            }
            InFlightKind::Removal { index, row, success } => {
                if result.is_ok() {
                    self.notify(Notice::info(success));
                } else {
                    panel.collection.reinsert(index, row);
                    panel.reattach_selection();
                    if let Err(e) = result {
                        self.notify(Notice::error(format!("Delete failed: {}", e)));
                    }
                }
            }
            InFlightKind::Inverse {
                snapshot,
                reseat,
                description,
            } => {
                if result.is_ok() {
                    panel.collection.confirm(&entry.key);
                    self.notify(Notice::info(format!("Undid: {}", description)));
                } else {
                    if panel.collection.get(&entry.key).is_some_and(|r| r.pending) {
                        panel.collection.rollback(&entry.key, snapshot);
                        if reseat {
                            panel.collection.reposition(&entry.key);
                        }
                        panel.reattach_selection();
                    }
                    self.notify(Notice::error(format!("Failed to undo: {}", description)));
                }
            }
            InFlightKind::Reorder {
                previous_order,
                description,
            } => {
                if result.is_ok() {
                    self.undo.push(UndoableAction::Reorder {
                        panel: entry.panel.clone(),
                        key: entry.key.clone(),
                        previous_order,
                        description,
                    });
                } else {
                    self.notify(Notice::error("Failed to save order"));
                    self.refresh_panel(&entry.panel);
                }
            }
            InFlightKind::Maintenance => {
                if result.is_err() {
                    self.refresh_panel(&entry.panel);
                }
            }
        }
    }
}

/// Local application of an action's inverse; mirrors `inverse_op`.
fn apply_inverse(row: &mut Row, action: &UndoableAction) {
    match action {
        UndoableAction::Complete { .. } => row.fields.done = false,
        UndoableAction::Defer { previous_due, .. } => row.fields.due_date = *previous_due,
        UndoableAction::Reorder { previous_order, .. } => row.order = *previous_order,
        UndoableAction::SetState { previous_state, .. } => {
            row.group = previous_state.clone();
            row.fields.status = previous_state.clone();
        }
        UndoableAction::Assign {
            previous_assignee, ..
        } => row.fields.assignee = previous_assignee.clone(),
        UndoableAction::Abandon { .. } => row.fields.abandoned = false,
    }
}

/// Truncate a title for notices and undo descriptions.
fn short(s: &str) -> String {
    if s.chars().count() <= 30 {
        s.to_string()
    } else {
        let cut: String = s.chars().take(30).collect();
        format!("{}…", cut)
    }
}
