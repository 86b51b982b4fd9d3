//! Study service: item management, grading and the queries behind them.
//!
//! Every storage call goes through [`with_retry`](crate::db::with_retry) with
//! the connection acquired inside the retried closure. Events are published
//! only after the connection is released, so sinks are free to use the
//! database themselves.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::{Clock, SystemClock};
use crate::config::{RetryPolicy, Settings, DEFAULT_LANGUAGE};
use crate::db::{self, DbPool};
use crate::domain::{due_after, Bucket, BucketCounts, DueItem, Item, ItemFields, ReviewState, UserDifficulty};
use crate::error::{Error, Result};
use crate::events::{EventSink, StudyEvent};
use crate::srs;

pub struct StudyService {
    pool: DbPool,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    default_language: String,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl StudyService {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            retry: RetryPolicy::default(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            sinks: Vec::new(),
        }
    }

    /// Service on the wall clock, configured from `settings`.
    pub fn from_settings(pool: DbPool, settings: &Settings) -> Self {
        Self::new(pool, Arc::new(SystemClock))
            .with_retry(settings.retry)
            .with_default_language(&settings.default_language)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_language(mut self, language: &str) -> Self {
        self.default_language = language.to_string();
        self
    }

    /// Register a sink for study events.
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn publish(&self, event: StudyEvent) {
        let at = self.clock.now();
        for sink in &self.sinks {
            sink.publish(&event, at);
        }
    }

    // ==================== Items ====================

    /// Add an item. Its review state starts due today.
    pub fn create_item(&self, fields: &ItemFields) -> Result<i64> {
        let fields = fields.normalized(&self.default_language)?;
        let now = self.clock.now();
        let today = self.clock.today();

        let id = db::with_retry(&self.retry, "create item", || {
            let mut conn = db::try_lock(&self.pool)?;
            Ok(db::create_item(&mut conn, &fields, now, today)?)
        })?;

        tracing::info!("Created item {} ({})", id, fields.front);
        self.publish(StudyEvent::ItemCreated { item_id: id });
        Ok(id)
    }

    /// Replace an item's content. Scheduling is left untouched.
    pub fn update_item(&self, item_id: i64, fields: &ItemFields) -> Result<()> {
        check_id(item_id)?;
        let fields = fields.normalized(&self.default_language)?;
        let now = self.clock.now();

        let updated = db::with_retry(&self.retry, "update item", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::update_item(&conn, item_id, &fields, now)?)
        })?;
        if !updated {
            return Err(Error::NotFound(item_id));
        }

        tracing::info!("Updated item {}", item_id);
        self.publish(StudyEvent::ItemUpdated { item_id });
        Ok(())
    }

    /// Delete an item and its review state. Deleting a missing item is a
    /// no-op; the return value says whether anything was removed.
    pub fn delete_item(&self, item_id: i64) -> Result<bool> {
        check_id(item_id)?;

        let deleted = db::with_retry(&self.retry, "delete item", || {
            let mut conn = db::try_lock(&self.pool)?;
            Ok(db::delete_item(&mut conn, item_id)?)
        })?;

        if deleted {
            tracing::info!("Deleted item {}", item_id);
            self.publish(StudyEvent::ItemDeleted { item_id });
        } else {
            tracing::debug!("Delete of missing item {} ignored", item_id);
        }
        Ok(deleted)
    }

    pub fn get_item(&self, item_id: i64) -> Result<Option<Item>> {
        check_id(item_id)?;
        db::with_retry(&self.retry, "get item", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::get_item(&conn, item_id)?)
        })
    }

    pub fn get_item_with_review(&self, item_id: i64) -> Result<Option<DueItem>> {
        check_id(item_id)?;
        db::with_retry(&self.retry, "get item with review", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::get_item_with_review(&conn, item_id)?)
        })
    }

    pub fn list_items(&self, filter_text: &str, tag: &str) -> Result<Vec<Item>> {
        db::with_retry(&self.retry, "list items", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::list_items(&conn, filter_text, tag)?)
        })
    }

    pub fn all_tags(&self) -> Result<Vec<String>> {
        db::with_retry(&self.retry, "list tags", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::all_tags(&conn)?)
        })
    }

    pub fn items_created_on(&self, date: NaiveDate) -> Result<Vec<Item>> {
        db::with_retry(&self.retry, "items created on", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::items_created_on(&conn, date)?)
        })
    }

    pub fn count_items(&self) -> Result<i64> {
        db::with_retry(&self.retry, "count items", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::count_items(&conn)?)
        })
    }

    // ==================== Reviewing ====================

    /// Items due on or before `as_of`, earliest first.
    pub fn due_items(&self, as_of: NaiveDate) -> Result<Vec<DueItem>> {
        db::with_retry(&self.retry, "due items", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::get_due_items(&conn, as_of)?)
        })
    }

    pub fn due_today(&self) -> Result<Vec<DueItem>> {
        self.due_items(self.clock.today())
    }

    /// Record how hard recalling `item_id` felt and reschedule it.
    ///
    /// Scheduling and persistence happen in one transaction. Returns the
    /// stored state.
    pub fn grade(&self, item_id: i64, difficulty: UserDifficulty) -> Result<ReviewState> {
        check_id(item_id)?;
        let now = self.clock.now();
        let today = self.clock.today();
        let quality = difficulty.to_quality();

        let state = db::with_retry(&self.retry, "grade item", || {
            let mut conn = db::try_lock(&self.pool)?;
            let tx = conn.transaction()?;

            if db::get_item(&tx, item_id)?.is_none() {
                return Err(Error::NotFound(item_id));
            }
            let current = match db::get_review_state(&tx, item_id)? {
                Some(state) => state,
                None => {
                    tracing::warn!("Item {} had no review state, starting fresh", item_id);
                    let fresh = ReviewState::new(item_id, today);
                    db::insert_review_state(&tx, &fresh)?;
                    fresh
                }
            };

            let next = srs::next_state(&current, quality as i64);
            let state = ReviewState {
                item_id,
                due_date: due_after(today, next.interval_days),
                interval_days: next.interval_days,
                repetitions: next.repetitions,
                ease: next.ease,
                last_quality: Some(difficulty.value()),
                last_reviewed_at: Some(now),
            };
            db::save_review_state(&tx, &state)?;
            tx.commit()?;
            Ok(state)
        })?;

        tracing::debug!(
            "Graded item {} as {} (quality {}): interval {}d, reps {}, ease {:.2}",
            item_id,
            difficulty.value(),
            quality,
            state.interval_days,
            state.repetitions,
            state.ease
        );
        self.publish(StudyEvent::GradeSubmitted {
            item_id,
            user_difficulty: difficulty.value(),
            quality,
            interval_days: state.interval_days,
        });
        Ok(state)
    }

    /// Intervals each difficulty 1..5 would schedule for `item_id` right now.
    pub fn preview(&self, item_id: i64) -> Result<[i64; 5]> {
        let due = self
            .get_item_with_review(item_id)?
            .ok_or(Error::NotFound(item_id))?;
        Ok(srs::preview_intervals(&due.review))
    }

    // ==================== Triage ====================

    pub fn bucket_counts(&self) -> Result<BucketCounts> {
        db::with_retry(&self.retry, "bucket counts", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::bucket_counts(&conn)?)
        })
    }

    pub fn items_in_bucket(&self, bucket: Bucket) -> Result<Vec<Item>> {
        db::with_retry(&self.retry, "items in bucket", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::items_in_bucket(&conn, bucket)?)
        })
    }

    /// Cumulative due counts for the next `days` days, starting today.
    pub fn due_forecast(&self, days: u32) -> Result<Vec<(NaiveDate, i64)>> {
        let from = self.clock.today();
        db::with_retry(&self.retry, "due forecast", || {
            let conn = db::try_lock(&self.pool)?;
            Ok(db::due_forecast(&conn, from, days)?)
        })
    }
}

fn check_id(item_id: i64) -> Result<()> {
    if item_id <= 0 {
        return Err(Error::validation(format!("item id must be positive, got {}", item_id)));
    }
    Ok(())
}
