use area_types::{epoch_now, ActionResponse, TriggerResponse};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::{ConfigError, ConfigSchema, FieldKind, FieldSpec, ValidatedConfig};

use super::{passes_filter, Action, ComponentError, Trigger};

pub fn register(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_trigger("time_trigger", "core", ConfigSchema::new(), |config| {
        Ok(Box::new(TimeTrigger::new(config)))
    })?;

    registry.register_trigger(
        "date_trigger",
        "core",
        ConfigSchema::new().field(FieldSpec::required("target_date", FieldKind::String)),
        |config| Ok(Box::new(DateTrigger::new(config)?)),
    )?;

    registry.register_trigger(
        "time_of_day_trigger",
        "core",
        ConfigSchema::new().field(FieldSpec::required("target_time", FieldKind::String)),
        |config| Ok(Box::new(TimeOfDayTrigger::new(config)?)),
    )?;

    registry.register_action(
        "time_action",
        "core",
        ConfigSchema::new()
            .field(FieldSpec::optional("event_time", FieldKind::Float))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(TimeAction { config })),
    )?;

    registry.register_action(
        "date_action",
        "core",
        ConfigSchema::new()
            .field(FieldSpec::with_default(
                "date_message",
                FieldKind::String,
                "Date action executed",
            ))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(DateAction { config })),
    )?;

    registry.register_action(
        "time_of_day_action",
        "core",
        ConfigSchema::new()
            .field(FieldSpec::with_default(
                "time_message",
                FieldKind::String,
                "Time of day action executed",
            ))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(TimeOfDayAction { config })),
    )?;

    Ok(())
}

/// Fires whenever `interval` seconds have elapsed since the last firing.
/// The cursor starts from the validated config's `last_run`, so a restart
/// does not double-fire if the caller persists it.
pub struct TimeTrigger {
    interval: u64,
    last_run: f64,
}

impl TimeTrigger {
    fn new(config: ValidatedConfig) -> Self {
        Self {
            interval: config.interval_secs(),
            last_run: config.last_run(),
        }
    }
}

#[async_trait]
impl Trigger for TimeTrigger {
    fn name(&self) -> &'static str {
        "time_trigger"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let now = epoch_now();
        if now - self.last_run < self.interval as f64 {
            return Ok(None);
        }
        self.last_run = now;

        Ok(Some(
            TriggerResponse::new(format!("{now}"))
                .with_detail("event", "time_trigger")
                .with_field("event_time", now),
        ))
    }
}

/// Fires once when the target instant passes, then stays quiet
#[derive(Debug)]
pub struct DateTrigger {
    target: f64,
    fired: bool,
}

impl DateTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let raw = config.get_str("target_date").unwrap_or_default().to_string();
        let target = parse_target_date(&raw).ok_or_else(|| {
            ComponentError::Config(ConfigError::OutOfRange {
                field: "target_date".to_string(),
                reason: format!("`{raw}` is not an ISO-8601 datetime"),
            })
        })?;

        Ok(Self {
            target,
            fired: false,
        })
    }
}

fn parse_target_date(raw: &str) -> Option<f64> {
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.timestamp() as f64);
    }
    // also accept a naive local-less datetime like "2023-12-31T23:59:59"
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp() as f64)
}

#[async_trait]
impl Trigger for DateTrigger {
    fn name(&self) -> &'static str {
        "date_trigger"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let now = epoch_now();
        if self.fired || now < self.target {
            return Ok(None);
        }
        self.fired = true;

        Ok(Some(
            TriggerResponse::new(format!("{now}"))
                .with_detail("event", "date_trigger")
                .with_field("event_time", now),
        ))
    }
}

/// Fires once a day when the clock passes `target_time` (UTC, "HH:MM:SS")
pub struct TimeOfDayTrigger {
    target: NaiveTime,
    last_run_date: Option<NaiveDate>,
}

impl TimeOfDayTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let raw = config.get_str("target_time").unwrap_or_default().to_string();
        let target = NaiveTime::parse_from_str(&raw, "%H:%M:%S").map_err(|_| {
            ComponentError::Config(ConfigError::OutOfRange {
                field: "target_time".to_string(),
                reason: format!("`{raw}` is not a HH:MM:SS time of day"),
            })
        })?;

        Ok(Self {
            target,
            last_run_date: None,
        })
    }
}

#[async_trait]
impl Trigger for TimeOfDayTrigger {
    fn name(&self) -> &'static str {
        "time_of_day_trigger"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let now = Utc::now();
        let today = now.date_naive();

        if now.time() < self.target || self.last_run_date == Some(today) {
            return Ok(None);
        }
        self.last_run_date = Some(today);

        let at = epoch_now();
        Ok(Some(
            TriggerResponse::new(format!("{at}"))
                .with_detail("event", "time_of_day_trigger")
                .with_field("event_time", at),
        ))
    }
}

pub struct TimeAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for TimeAction {
    fn name(&self) -> &'static str {
        "time_action"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let mut response =
            ActionResponse::ok().with_detail("message", "Time action executed successfully");
        if let Some(event_time) = self.config.get_f64("event_time") {
            response = response.with_field("event_time", event_time);
        }
        Ok(Some(response))
    }
}

pub struct DateAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for DateAction {
    fn name(&self) -> &'static str {
        "date_action"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let message = self.config.get_str("date_message").unwrap_or_default();
        Ok(Some(ActionResponse::ok().with_detail("message", message)))
    }
}

pub struct TimeOfDayAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for TimeOfDayAction {
    fn name(&self) -> &'static str {
        "time_of_day_action"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let message = self.config.get_str("time_message").unwrap_or_default();
        Ok(Some(ActionResponse::ok().with_detail("message", message)))
    }
}
