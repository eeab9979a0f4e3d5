//! Shared fixtures for workflow tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use super::builder::ServiceContextBuilder;
use super::context::ServiceContext;
use crate::domain::{LabelId, Project};
use crate::impls::InMemoryTaskService;
use crate::ports::FixedClock;

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 30, 4, 5, 22).unwrap()
}

/// Inbox (1), Work (2), labels 7 "urgent" and 8 "home".
pub(crate) fn seeded_service() -> InMemoryTaskService {
    InMemoryTaskService::new()
        .with_clock(Arc::new(FixedClock::new(now())))
        .with_project(Project::new(1, "Inbox"))
        .with_project(Project::new(2, "Work"))
        .with_label(LabelId::new(7), "urgent")
        .with_label(LabelId::new(8), "home")
}

/// Context with zero retry delays and a fixed clock.
pub(crate) fn fixture_with(service: InMemoryTaskService) -> (Arc<InMemoryTaskService>, ServiceContext) {
    let service = Arc::new(service);
    let ctx = ServiceContextBuilder::new()
        .service(service.clone())
        .clock(Arc::new(FixedClock::new(now())))
        .map_policies(|p| p.with_base_delay(Duration::ZERO).with_jitter(false))
        .build()
        .unwrap();
    (service, ctx)
}

pub(crate) fn fixture() -> (Arc<InMemoryTaskService>, ServiceContext) {
    fixture_with(seeded_service())
}
