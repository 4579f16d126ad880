use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::service::BookingService;

/// Background task that periodically cancels expired holds.
pub async fn run_reaper(service: Arc<BookingService>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        match service.sweep_expired_holds(Utc::now()).await {
            Ok(outcome) => {
                if !outcome.cancelled.is_empty() {
                    info!("reaped {} expired holds", outcome.cancelled.len());
                }
                for (id, e) in &outcome.skipped {
                    debug!("reaper skip {id}: {e}");
                }
            }
            Err(e) => warn!("hold sweep failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use crate::service::{BookingOutcome, BookingStore, InMemoryStore};
    use chrono::{NaiveTime, TimeDelta};
    use rust_decimal_macros::dec;
    use ulid::Ulid;

    #[tokio::test]
    async fn reaper_cancels_expired_holds() {
        let store = Arc::new(InMemoryStore::new());
        let facility = FacilityConfig {
            id: Ulid::new(),
            name: "Studio".into(),
            open_time: NaiveTime::MIN,
            close_time: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
            slot_duration_minutes: 30,
            pricing: PricingConfig {
                base_price_per_hour: dec!(20),
                currency: "USD".into(),
            },
        };
        store.put_facility(facility.clone());
        let service = Arc::new(
            BookingService::new(store.clone(), Arc::new(NotifyHub::new()))
                .with_hold(TimeDelta::milliseconds(1)),
        );

        // A hold placed an hour ago, on today's schedule.
        let placed = Utc::now() - TimeDelta::hours(1);
        let start = placed
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(0, 30, 0).unwrap())
            .and_utc();
        let request = BookingRequest {
            facility_id: facility.id,
            span: Span::new(start, start + TimeDelta::minutes(30)),
            promo_code: None,
            initial_status: Some(BookingStatus::Pending),
        };
        let outcome = service.create_booking(&request, placed).await.unwrap();
        let BookingOutcome::Booked(hold) = outcome else {
            panic!("expected booking");
        };

        let task = tokio::spawn(run_reaper(service.clone(), Duration::from_millis(10)));
        let mut status = BookingStatus::Pending;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = store.booking(hold.id).await.unwrap().unwrap().status;
            if status == BookingStatus::Cancelled {
                break;
            }
        }
        task.abort();
        assert_eq!(status, BookingStatus::Cancelled);
    }
}
