use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{JobQueue, QueueError};
use crate::service::ServiceKind;

/// Pending work and expected wait for one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEstimate {
    pub count_per_service: BTreeMap<ServiceKind, u64>,
    /// Every record, including ones whose service could not be read.
    pub count_total: u64,
    /// Seconds.
    pub total_estimated_wait_time: u64,
}

impl QueueEstimate {
    /// Client-facing summary line.
    pub fn status_message(&self) -> String {
        if self.count_total == 0 {
            "No jobs in queue".to_string()
        } else {
            format!(
                "Photo queued for processing. Estimated wait: {} seconds",
                self.total_estimated_wait_time
            )
        }
    }
}

/// Picks the least-loaded queue and estimates waiting time.
#[derive(Clone)]
pub struct QueueBalancer {
    queue: Arc<dyn JobQueue>,
}

impl QueueBalancer {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Returns the candidate with the fewest pending records. Ties go to the
    /// earliest candidate.
    pub fn select_queue<'a>(&self, candidates: &'a [String]) -> Result<&'a str, QueueError> {
        let mut best: Option<(&'a str, u64)> = None;

        for name in candidates {
            let count = self.queue.count(name)?;
            debug!(queue = %name, pending = count, "Queue load");
            match best {
                Some((_, best_count)) if count >= best_count => {}
                _ => best = Some((name.as_str(), count)),
            }
        }

        best.map(|(name, _)| name).ok_or(QueueError::NoCandidates)
    }

    /// Counts pending records of `queue` per service and sums their
    /// estimated processing time.
    pub fn estimate(&self, queue: &str) -> Result<QueueEstimate, QueueError> {
        let payloads = self.queue.pending_payloads(queue)?;

        let mut count_per_service: BTreeMap<ServiceKind, u64> =
            ServiceKind::ALL.iter().map(|s| (*s, 0)).collect();
        let mut total_estimated_wait_time = 0;

        for payload in &payloads {
            let Some(service) = payload_service(payload) else {
                continue;
            };
            *count_per_service.entry(service).or_default() += 1;
            total_estimated_wait_time += service.estimated_secs();
        }

        Ok(QueueEstimate {
            count_per_service,
            count_total: payloads.len() as u64,
            total_estimated_wait_time,
        })
    }
}

fn payload_service(payload: &str) -> Option<ServiceKind> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    value.get("service")?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{PhotoRequest, QueuedJob, SqliteJobQueue};

    fn photo(service: ServiceKind) -> QueuedJob {
        QueuedJob::Photo(PhotoRequest {
            service,
            source: "http://x/a.png".to_string(),
            bg_color: None,
            channel: "c".to_string(),
            canvas_index: None,
            element_index: None,
        })
    }

    fn queues(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_selects_least_loaded() {
        let store = Arc::new(SqliteJobQueue::in_memory().unwrap());
        store.push("python", &photo(ServiceKind::Gfpgan)).unwrap();
        store.push("python", &photo(ServiceKind::Gfpgan)).unwrap();
        store.push("python2", &photo(ServiceKind::Gfpgan)).unwrap();

        let balancer = QueueBalancer::new(store);
        assert_eq!(
            balancer.select_queue(&queues(&["python", "python2"])).unwrap(),
            "python2"
        );
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let store = Arc::new(SqliteJobQueue::in_memory().unwrap());
        let balancer = QueueBalancer::new(store.clone());
        assert_eq!(
            balancer.select_queue(&queues(&["python", "python2"])).unwrap(),
            "python"
        );

        store.push("python", &photo(ServiceKind::Rembg)).unwrap();
        store.push("python2", &photo(ServiceKind::Rembg)).unwrap();
        assert_eq!(
            balancer.select_queue(&queues(&["python", "python2"])).unwrap(),
            "python"
        );
    }

    #[test]
    fn test_no_candidates() {
        let balancer = QueueBalancer::new(Arc::new(SqliteJobQueue::in_memory().unwrap()));
        assert!(matches!(
            balancer.select_queue(&[]),
            Err(QueueError::NoCandidates)
        ));
    }

    #[test]
    fn test_estimate_sums_per_service_times() {
        let store = Arc::new(SqliteJobQueue::in_memory().unwrap());
        store.push("python", &photo(ServiceKind::Gfpgan)).unwrap();
        store.push("python", &photo(ServiceKind::Gfpgan)).unwrap();
        store.push("python", &photo(ServiceKind::Rembg)).unwrap();

        let estimate = QueueBalancer::new(store).estimate("python").unwrap();
        assert_eq!(estimate.count_per_service[&ServiceKind::Gfpgan], 2);
        assert_eq!(estimate.count_per_service[&ServiceKind::Rembg], 1);
        assert_eq!(estimate.count_total, 3);
        assert_eq!(estimate.total_estimated_wait_time, 46);
        assert!(estimate.status_message().contains("46"));
    }

    #[test]
    fn test_unreadable_payload_counts_but_adds_no_time() {
        let store = Arc::new(SqliteJobQueue::in_memory().unwrap());
        store.push_raw("python", "{\"kind\":\"photo\"}").unwrap();
        store.push_raw("python", "garbage").unwrap();
        store.push("python", &photo(ServiceKind::Rembg)).unwrap();

        let estimate = QueueBalancer::new(store).estimate("python").unwrap();
        assert_eq!(estimate.count_total, 3);
        assert_eq!(estimate.total_estimated_wait_time, 10);
    }

    #[test]
    fn test_empty_queue_estimate() {
        let estimate = QueueBalancer::new(Arc::new(SqliteJobQueue::in_memory().unwrap()))
            .estimate("python")
            .unwrap();
        assert_eq!(estimate.count_total, 0);
        assert_eq!(estimate.total_estimated_wait_time, 0);
        assert_eq!(estimate.count_per_service.len(), 2);
        assert_eq!(estimate.status_message(), "No jobs in queue");

        let json = serde_json::to_value(&estimate).unwrap();
        assert_eq!(json["count_per_service"]["GFPGAN"], 0);
    }
}
