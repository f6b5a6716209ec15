//! Form sessions.
//!
//! A [`FormSession`] is the stateful face of the [`Coordinator`]: it keeps
//! the latest [`Snapshot`] and pushes every new one to its subscribers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::EngineConfig;
use crate::error::{SchemaError, SessionError, SubmitError};
use crate::formula::{Clock, SandboxEvaluator, SystemClock};
use crate::schema::{FieldValue, FormSchema, Values};

use super::coordinator::{Coordinator, Snapshot};
use super::subscriber::{Subscriber, SubscriberId};

/// A successfully submitted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub form: String,
    pub submitted_at: DateTime<Utc>,
    pub values: Values,
}

pub struct FormSession {
    coordinator: Coordinator,
    snapshot: Snapshot,
    subscribers: Vec<Subscriber>,
    clock: Arc<dyn Clock>,
}

impl FormSession {
    /// A session on the system clock with the built-in formula sandbox.
    pub fn new(schema: FormSchema) -> Result<Self, SchemaError> {
        Self::with_clock(schema, EngineConfig::default(), Arc::new(SystemClock))
    }

    /// A session whose formulas and submissions read time from `clock`.
    pub fn with_clock(
        schema: FormSchema,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SchemaError> {
        let formulas = Arc::new(SandboxEvaluator::with_limits(
            clock.clone(),
            config.formula,
        ));
        let coordinator = Coordinator::with_config(schema, formulas, config)?;
        Ok(Self::from_coordinator(coordinator, clock))
    }

    pub fn from_coordinator(coordinator: Coordinator, clock: Arc<dyn Clock>) -> Self {
        let snapshot = coordinator.initial_snapshot();
        debug!(
            form = %coordinator.schema().name,
            fields = coordinator.schema().fields.len(),
            "session started"
        );
        Self {
            coordinator,
            snapshot,
            subscribers: Vec::new(),
            clock,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn schema(&self) -> &FormSchema {
        self.coordinator.schema()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn values(&self) -> &Values {
        &self.snapshot.values
    }

    /// Register a callback for every emitted snapshot.
    pub fn subscribe<F>(&mut self, notify: F) -> SubscriberId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let subscriber = Subscriber::new(notify);
        let id = subscriber.id();
        self.subscribers.push(subscriber);
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id() != id);
        self.subscribers.len() != before
    }

    pub fn set_value(
        &mut self,
        id: &str,
        value: impl Into<FieldValue>,
    ) -> Result<&Snapshot, SessionError> {
        self.apply(id, Some(value.into()))
    }

    pub fn clear_value(&mut self, id: &str) -> Result<&Snapshot, SessionError> {
        self.apply(id, None)
    }

    fn apply(&mut self, id: &str, value: Option<FieldValue>) -> Result<&Snapshot, SessionError> {
        trace!(field = id, cleared = value.is_none(), "applying edit");
        self.snapshot = self.coordinator.set_value(&self.snapshot, id, value)?;
        self.emit();
        Ok(&self.snapshot)
    }

    fn emit(&self) {
        for subscriber in &self.subscribers {
            subscriber.notify(&self.snapshot);
        }
    }

    /// Percentage of fields currently holding a non-blank value.
    pub fn progress(&self) -> f64 {
        let fields = &self.schema().fields;
        if fields.is_empty() {
            return 0.0;
        }
        let filled = fields
            .iter()
            .filter(|f| {
                self.snapshot
                    .value(f.id.as_str())
                    .is_some_and(|v| !v.is_blank())
            })
            .count();
        filled as f64 / fields.len() as f64 * 100.0
    }

    /// Validate every field.
    ///
    /// Either way the snapshot's errors are replaced by the outcome and
    /// emitted: every failing field on failure, none on success.
    pub fn submit(&mut self) -> Result<Submission, SubmitError> {
        if let Err(err) = self.coordinator.submit(&self.snapshot) {
            debug!(invalid = err.errors.len(), "submit rejected");
            self.snapshot.errors = err.errors.clone();
            self.emit();
            return Err(err);
        }

        self.snapshot.errors.clear();
        self.emit();
        let submission = Submission {
            form: self.schema().name.clone(),
            submitted_at: self.clock.now(),
            values: self.snapshot.values.clone(),
        };
        info!(form = %submission.form, "form submitted");
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::formula::FixedClock;
    use crate::schema::{DerivedSpec, Field, FieldType, ValidationSpec};
    use crate::validation::Rule;

    fn session() -> FormSession {
        let schema = FormSchema::new(
            "profile",
            Utc::now(),
            vec![
                Field::new("name", FieldType::ShortText, "Name").required(),
                Field::new("dob", FieldType::Date, "Date of birth"),
                Field::new("age", FieldType::Number, "Age")
                    .derived_from(DerivedSpec::new(["dob"], "current_year() - year(dob)")),
                Field::new("pets", FieldType::MultiChoiceGroup, "Pets")
                    .with_options(["cat", "dog"]),
            ],
        );
        let clock = Arc::new(FixedClock::on_date(2025, 6, 1).unwrap());
        FormSession::with_clock(schema, EngineConfig::default(), clock).unwrap()
    }

    #[test]
    fn subscribers_see_every_edit() {
        let mut session = session();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let id = session.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        session.set_value("name", "Ada").unwrap();
        session.set_value("dob", "2000-01-01").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(session.unsubscribe(id));
        assert!(!session.unsubscribe(id));
        session.clear_value("name").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_edit_keeps_the_snapshot() {
        let mut session = session();
        session.set_value("name", "Ada").unwrap();
        assert!(session.set_value("missing", "x").is_err());
        assert_eq!(session.values().len(), 1);
    }

    #[test]
    fn progress_counts_filled_fields() {
        let mut session = session();
        assert_eq!(session.progress(), 0.0);

        session.set_value("name", "Ada").unwrap();
        session.set_value("dob", "2000-01-01").unwrap();
        // name, dob and the derived age
        assert_eq!(session.progress(), 75.0);

        session.set_value("pets", Vec::<String>::new()).unwrap();
        assert_eq!(session.progress(), 75.0);
    }

    #[test]
    fn submit_reports_then_accepts() {
        let mut session = session();
        let err = session.submit().unwrap_err();
        assert!(err.errors.contains_key("name"));
        assert!(session.snapshot().error("name").is_some());

        session.set_value("name", "Ada").unwrap();
        let submission = session.submit().unwrap();
        assert_eq!(submission.form, "profile");
        assert_eq!(submission.submitted_at.to_rfc3339(), "2025-06-01T12:00:00+00:00");
        assert_eq!(submission.values["name"], FieldValue::text("Ada"));
        assert!(session.snapshot().errors.is_empty());
    }

    #[test]
    fn subscribers_see_the_submit_outcome() {
        let mut session = session();
        let calls = Arc::new(AtomicUsize::new(0));
        let last_errors = Arc::new(AtomicUsize::new(usize::MAX));
        let (calls_clone, errors_clone) = (calls.clone(), last_errors.clone());
        session.subscribe(move |snapshot| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            errors_clone.store(snapshot.errors.len(), Ordering::SeqCst);
        });

        session.submit().unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_errors.load(Ordering::SeqCst), 1);

        session.set_value("name", "Ada").unwrap();
        session.submit().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(last_errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn runs_with_inverted_length_bounds() {
        let schema = FormSchema::new(
            "lengths",
            Utc::now(),
            vec![Field::new("pw", FieldType::ShortText, "Password").with_validation(
                ValidationSpec {
                    min_length: Some(10),
                    max_length: Some(4),
                    ..ValidationSpec::default()
                },
            )],
        );
        let mut session = FormSession::new(schema).unwrap();

        let snapshot = session.set_value("pw", "abcdefghijkl").unwrap();
        assert_eq!(snapshot.error("pw").map(|e| e.rule), Some(Rule::MaxLength));
        let snapshot = session.set_value("pw", "abc").unwrap();
        assert_eq!(snapshot.error("pw").map(|e| e.rule), Some(Rule::MinLength));
        assert!(session.clear_value("pw").unwrap().errors.is_empty());
    }
}
