// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::cell::Cell;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use crate::error::{self, ErrorId};
use crate::gridengine::command::CommandRunner;
use crate::gridengine::reconcile::{PresentationHost, PresentationJob};
use crate::gridengine::types::{JobId, JobState};
use crate::gridengine::{collect_status, StatusSnapshot};
use crate::units::{natural_compare, NaturalKey};

/// Column that can be sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    Load,
    Mem,
    Vmem,
    Jobs,
}

impl SortColumn {
    /// Get next column (for cycling with > key)
    pub fn next(self) -> Self {
        match self {
            SortColumn::Name => SortColumn::Load,
            SortColumn::Load => SortColumn::Mem,
            SortColumn::Mem => SortColumn::Vmem,
            SortColumn::Vmem => SortColumn::Jobs,
            SortColumn::Jobs => SortColumn::Name,
        }
    }

    /// Get previous column (for cycling with < key)
    pub fn prev(self) -> Self {
        match self {
            SortColumn::Name => SortColumn::Jobs,
            SortColumn::Load => SortColumn::Name,
            SortColumn::Mem => SortColumn::Load,
            SortColumn::Vmem => SortColumn::Mem,
            SortColumn::Jobs => SortColumn::Vmem,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Host data for one table row
#[derive(Debug, Clone, PartialEq)]
pub struct FlatHost {
    pub name: String,
    pub load: i64,
    pub mem: i64,
    pub vmem: u64,
    pub jobs: usize,
}

/// Job data for one table row
#[derive(Debug, Clone, PartialEq)]
pub struct FlatJob {
    pub num: JobId,
    pub name: String,
    pub tool: String,
    pub queue: String,
    pub state: JobState,
    /// Requested h_vmem in megabytes
    pub h_vmem_mb: Option<f64>,
    /// Seconds since submission, `None` without a submission time
    pub runtime: Option<u64>,
}

/// Display item in the flattened host/job table
#[derive(Debug, Clone, PartialEq)]
pub enum TableItem {
    Host(FlatHost),
    Job { data: FlatJob, is_last: bool },
}

/// Timing of the last refresh
#[derive(Clone, Default)]
pub struct RefreshStats {
    /// Time to run both commands and reconcile, in milliseconds
    pub refresh_time_ms: f32,
    pub refreshes: u64,
}

/// Application state
pub struct App<R> {
    runner: R,
    /// Drives one refresh at a time
    runtime: Runtime,
    /// The last successful snapshot
    pub snapshot: Option<StatusSnapshot>,
    /// Flattened rows for display
    pub items: Vec<TableItem>,
    /// Currently selected item index
    pub selected: usize,
    /// First visible row, kept between frames
    pub scroll: Cell<usize>,
    /// Should quit
    pub should_quit: bool,
    /// Correlation id of the last failed refresh
    pub error: Option<ErrorId>,
    /// Current sort column
    pub sort_column: SortColumn,
    /// Current sort direction
    pub sort_direction: SortDirection,
    pub stats: RefreshStats,
}

impl<R: CommandRunner> App<R> {
    pub fn new(runner: R) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create tokio runtime")?;

        Ok(Self {
            runner,
            runtime,
            snapshot: None,
            items: Vec::new(),
            selected: 0,
            scroll: Cell::new(0),
            should_quit: false,
            error: None,
            sort_column: SortColumn::Name,
            sort_direction: SortDirection::Ascending,
            stats: RefreshStats::default(),
        })
    }

    /// Cycle to next sort column
    pub fn sort_next_column(&mut self) {
        self.sort_column = self.sort_column.next();
        self.rebuild_items();
    }

    /// Cycle to previous sort column
    pub fn sort_prev_column(&mut self) {
        self.sort_column = self.sort_column.prev();
        self.rebuild_items();
    }

    /// Toggle sort direction
    pub fn toggle_sort_direction(&mut self) {
        self.sort_direction = self.sort_direction.toggle();
        self.rebuild_items();
    }

    fn rebuild_items(&mut self) {
        if let Some(ref snapshot) = self.snapshot {
            self.items = flatten_snapshot(snapshot, self.sort_column, self.sort_direction);
            self.selected = self.selected.min(self.items.len().saturating_sub(1));
        }
    }

    /// Query the scheduler once and replace the table.
    ///
    /// A failed query keeps the previous rows and records the error id
    /// under which the failure was logged.
    pub fn refresh(&mut self) {
        let started = Instant::now();
        let result = self.runtime.block_on(collect_status(&self.runner));
        self.stats.refresh_time_ms = started.elapsed().as_secs_f32() * 1000.0;
        self.stats.refreshes += 1;

        match result {
            Ok(snapshot) => {
                tracing::info!(
                    hosts = snapshot.hosts.len(),
                    jobs = snapshot.job_count(),
                    elapsed_ms = self.stats.refresh_time_ms,
                    "refreshed grid status"
                );
                self.error = None;
                self.snapshot = Some(snapshot);
                self.rebuild_items();
            }
            Err(e) => {
                self.error = Some(error::report(&e));
            }
        }
    }

    /// Move selection up
    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    /// Move selection down
    pub fn select_next(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }

    /// Page up
    pub fn page_up(&mut self, page_size: usize) {
        self.selected = self.selected.saturating_sub(page_size);
    }

    /// Page down
    pub fn page_down(&mut self, page_size: usize) {
        self.selected = (self.selected + page_size).min(self.items.len().saturating_sub(1));
    }

    /// Jump to top
    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    /// Jump to bottom
    pub fn select_last(&mut self) {
        if !self.items.is_empty() {
            self.selected = self.items.len() - 1;
        }
    }
}

impl<R> App<R> {
    /// Scroll offset that keeps the selection inside a view of
    /// `visible_height` rows, moving only as far as needed. Remembered for
    /// the next frame.
    pub fn scroll_to_selection(&self, visible_height: usize) -> usize {
        let current = self.scroll.get();
        let scroll = if self.selected < current {
            self.selected
        } else if visible_height > 0 && self.selected >= current + visible_height {
            self.selected + 1 - visible_height
        } else {
            current
        };
        self.scroll.set(scroll);
        scroll
    }
}

/// Flatten hosts with their jobs nested below into display rows
fn flatten_snapshot(
    snapshot: &StatusSnapshot,
    sort_column: SortColumn,
    sort_direction: SortDirection,
) -> Vec<TableItem> {
    let mut hosts: Vec<(&NaturalKey, &PresentationHost)> = snapshot.hosts.iter().collect();
    sort_hosts(&mut hosts, sort_column, sort_direction);

    let mut items = Vec::with_capacity(hosts.len() + snapshot.job_count());
    for (name, host) in hosts {
        items.push(TableItem::Host(FlatHost {
            name: name.to_string(),
            load: host.load,
            mem: host.mem,
            vmem: host.vmem,
            jobs: host.jobs.len(),
        }));

        let job_count = host.jobs.len();
        for (i, job) in host.jobs.values().enumerate() {
            items.push(TableItem::Job {
                data: flatten_job(job, snapshot.generated_at),
                is_last: i + 1 == job_count,
            });
        }
    }
    items
}

fn flatten_job(job: &PresentationJob, now: u64) -> FlatJob {
    let runtime = (job.submit > 0).then(|| now.saturating_sub(job.submit as u64));

    FlatJob {
        num: job.num,
        name: job.name.clone(),
        tool: job.tool.clone(),
        queue: job.queue.clone(),
        state: job.state.clone(),
        h_vmem_mb: job.h_vmem.map(|bytes| bytes as f64 / (1024.0 * 1024.0)),
        runtime,
    }
}

/// Sort hosts by the specified column; ties fall back to natural name order
fn sort_hosts(
    hosts: &mut [(&NaturalKey, &PresentationHost)],
    column: SortColumn,
    direction: SortDirection,
) {
    hosts.sort_by(|(a_name, a), (b_name, b)| {
        let by_name = || natural_compare(a_name.as_str(), b_name.as_str());
        let cmp = match column {
            SortColumn::Name => a_name.cmp(b_name),
            SortColumn::Load => a.load.cmp(&b.load).then_with(by_name),
            SortColumn::Mem => a.mem.cmp(&b.mem).then_with(by_name),
            SortColumn::Vmem => a.vmem.cmp(&b.vmem).then_with(by_name),
            SortColumn::Jobs => a.jobs.len().cmp(&b.jobs.len()).then_with(by_name),
        };
        match direction {
            SortDirection::Ascending => cmp,
            SortDirection::Descending => cmp.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridengine::testing::{FixtureRunner, QHOST_XML};

    fn loaded_app() -> App<FixtureRunner> {
        let mut app = App::new(FixtureRunner::fixtures()).unwrap();
        app.refresh();
        app
    }

    fn host_names(app: &App<FixtureRunner>) -> Vec<&str> {
        app.items
            .iter()
            .filter_map(|item| match item {
                TableItem::Host(h) => Some(h.name.as_str()),
                TableItem::Job { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_refresh_flattens_hosts_and_jobs() {
        let app = loaded_app();
        assert!(app.error.is_none());
        assert_eq!(app.stats.refreshes, 1);
        // 3 hosts, 2 jobs on exec-2, 1 job on exec-10
        assert_eq!(app.items.len(), 6);

        match &app.items[0] {
            TableItem::Host(h) => {
                assert_eq!(h.name, "exec-2");
                assert_eq!(h.vmem, 1536);
                assert_eq!(h.jobs, 2);
            }
            other => panic!("expected host row, got {:?}", other),
        }
        match &app.items[1] {
            TableItem::Job { data, is_last } => {
                assert_eq!(data.num, 101);
                assert_eq!(data.tool, "stashbot");
                assert_eq!(data.h_vmem_mb, Some(512.0));
                assert!(data.runtime.is_some());
                assert!(!is_last);
            }
            other => panic!("expected job row, got {:?}", other),
        }
        assert!(matches!(&app.items[2], TableItem::Job { data, is_last: true } if data.num == 205));
    }

    #[test]
    fn test_default_order_is_natural() {
        let app = loaded_app();
        assert_eq!(host_names(&app), vec!["exec-2", "exec-10", "exec-down"]);
    }

    #[test]
    fn test_sort_by_load_descending() {
        let mut app = loaded_app();
        app.sort_next_column();
        assert_eq!(app.sort_column, SortColumn::Load);
        app.toggle_sort_direction();
        // exec-2 37%, exec-10 25%, exec-down 0%
        assert_eq!(host_names(&app), vec!["exec-2", "exec-10", "exec-down"]);

        app.toggle_sort_direction();
        assert_eq!(host_names(&app), vec!["exec-down", "exec-10", "exec-2"]);
    }

    #[test]
    fn test_sort_keeps_jobs_under_their_host() {
        let mut app = loaded_app();
        app.sort_prev_column();
        assert_eq!(app.sort_column, SortColumn::Jobs);
        let position = |num: JobId| {
            app.items
                .iter()
                .position(|item| matches!(item, TableItem::Job { data, .. } if data.num == num))
                .unwrap()
        };
        let exec10 = app
            .items
            .iter()
            .position(|item| matches!(item, TableItem::Host(h) if h.name == "exec-10"))
            .unwrap();
        assert_eq!(position(102), exec10 + 1);
    }

    #[test]
    fn test_failed_refresh_keeps_rows() {
        let mut app = loaded_app();
        app.runner = FixtureRunner {
            jobs: Err("exit status: 1: error: commlib error"),
            hosts: Ok(QHOST_XML),
        };
        app.refresh();

        let id = app.error.clone().unwrap();
        assert_eq!(id.as_str().len(), 17);
        assert_eq!(app.items.len(), 6);

        app.runner = FixtureRunner::fixtures();
        app.refresh();
        assert!(app.error.is_none());
    }

    #[test]
    fn test_navigation_bounds() {
        let mut app = loaded_app();
        app.select_prev();
        assert_eq!(app.selected, 0);
        app.page_down(100);
        assert_eq!(app.selected, 5);
        app.select_next();
        assert_eq!(app.selected, 5);
        app.page_up(2);
        assert_eq!(app.selected, 3);
        app.select_first();
        assert_eq!(app.selected, 0);
        app.select_last();
        assert_eq!(app.selected, 5);
    }

    #[test]
    fn test_scroll_is_kept_when_moving_back_up() {
        let mut app = loaded_app();
        assert_eq!(app.scroll_to_selection(3), 0);

        app.select_last();
        assert_eq!(app.scroll_to_selection(3), 3);

        // rows 3..6 are visible, row 4 still is
        app.select_prev();
        assert_eq!(app.selected, 4);
        assert_eq!(app.scroll_to_selection(3), 3);

        app.page_up(2);
        assert_eq!(app.selected, 2);
        assert_eq!(app.scroll_to_selection(3), 2);

        app.select_first();
        assert_eq!(app.scroll_to_selection(3), 0);
    }

    #[test]
    fn test_job_without_submit_time_has_no_runtime() {
        let job = PresentationJob {
            num: 1,
            name: "x".into(),
            submit: 0,
            owner: "alice".into(),
            tool: "alice".into(),
            queue: "(manual)".into(),
            h_vmem: None,
            host: "n1".into(),
            state: JobState::Running,
            priority: None,
            extra: Default::default(),
        };
        let flat = flatten_job(&job, 1_000);
        assert_eq!(flat.runtime, None);
        assert_eq!(flat.h_vmem_mb, None);

        let flat = flatten_job(&PresentationJob { submit: 400, ..job }, 1_000);
        assert_eq!(flat.runtime, Some(600));
    }
}
