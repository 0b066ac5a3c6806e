use anyhow::{Context, Result};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;

use crate::model::user::normalize_email;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;
const TAKEN_CAPACITY: u64 = 500_000;
const TAKEN_TTL: Duration = Duration::from_secs(86_400);

/// What the registry can say about an email without asking the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Never registered; the filter has no false negatives.
    Free,
    /// Seen as taken recently.
    Taken,
    /// Only the `users` table knows.
    Unknown,
}

/// In-memory index of registered emails.
///
/// The cuckoo filter holds every registered address and rules out most
/// unknown ones. The moka cache remembers addresses confirmed as taken.
/// All keys are normalized.
pub struct EmailRegistry {
    filter: RwLock<CuckooFilter<String>>,
    taken: Cache<String, ()>,
}

static REGISTRY: Lazy<EmailRegistry> =
    Lazy::new(|| EmailRegistry::new(FILTER_CAPACITY, TAKEN_CAPACITY, TAKEN_TTL));

pub fn registry() -> &'static EmailRegistry {
    &REGISTRY
}

impl EmailRegistry {
    pub fn new(filter_capacity: usize, taken_capacity: u64, taken_ttl: Duration) -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(filter_capacity, FALSE_POSITIVE_RATE)),
            taken: Cache::builder()
                .max_capacity(taken_capacity)
                .time_to_live(taken_ttl)
                .build(),
        }
    }

    pub fn lookup(&self, email: &str) -> Lookup {
        let email = normalize_email(email);

        // A poisoned lock answers "maybe" so the database decides.
        let maybe_present = self
            .filter
            .read()
            .map(|filter| filter.contains(&email))
            .unwrap_or(true);

        if !maybe_present {
            Lookup::Free
        } else if self.taken.contains_key(&email) {
            Lookup::Taken
        } else {
            Lookup::Unknown
        }
    }

    /// Records an address the database confirmed as taken.
    pub async fn confirm_taken(&self, email: &str) {
        self.taken.insert(normalize_email(email), ()).await;
    }

    /// A new row now owns `email`.
    pub async fn claim(&self, email: &str) {
        let email = normalize_email(email);
        if let Ok(mut filter) = self.filter.write() {
            filter.add(&email);
        }
        self.taken.insert(email, ()).await;
    }

    /// `email` was deleted or replaced.
    pub async fn release(&self, email: &str) {
        let email = normalize_email(email);
        if let Ok(mut filter) = self.filter.write() {
            filter.remove(&email);
        }
        self.taken.invalidate(&email).await;
    }

    /// Loads every address into the filter, and addresses that logged in
    /// during the last `recent_days` into the taken cache.
    pub async fn warm_up(
        &self,
        pool: &MySqlPool,
        recent_days: u32,
        batch_size: usize,
    ) -> Result<usize> {
        let mut rows = sqlx::query_as::<_, (String, bool)>(
            r#"
            SELECT email,
                   (last_login_at >= NOW() - INTERVAL ? DAY) IS TRUE
            FROM users
            "#,
        )
        .bind(recent_days)
        .fetch(pool);

        let mut batch: Vec<(String, bool)> = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = rows.next().await {
            let (email, recent) = row.context("email registry warm-up query failed")?;
            batch.push((normalize_email(&email), recent));
            total += 1;

            if batch.len() >= batch_size {
                self.load_batch(&mut batch).await;
            }
        }
        self.load_batch(&mut batch).await;

        log::info!("Email registry warm-up complete: {} addresses", total);
        Ok(total)
    }

    async fn load_batch(&self, batch: &mut Vec<(String, bool)>) {
        if let Ok(mut filter) = self.filter.write() {
            for (email, _) in batch.iter() {
                filter.add(email);
            }
        }
        for (email, recent) in batch.drain(..) {
            if recent {
                self.taken.insert(email, ()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EmailRegistry {
        EmailRegistry::new(1_000, 1_000, Duration::from_secs(60))
    }

    #[actix_web::test]
    async fn unseen_address_is_free() {
        let reg = registry();
        assert_eq!(reg.lookup("nobody@company.com"), Lookup::Free);
    }

    #[actix_web::test]
    async fn claimed_address_is_taken_case_insensitively() {
        let reg = registry();
        reg.claim("Jane.Doe@Company.com").await;
        assert_eq!(reg.lookup(" jane.doe@company.com "), Lookup::Taken);
    }

    #[actix_web::test]
    async fn released_address_is_free_again() {
        let reg = registry();
        reg.claim("leaver@company.com").await;
        reg.release("leaver@company.com").await;
        assert_eq!(reg.lookup("leaver@company.com"), Lookup::Free);
    }

    #[actix_web::test]
    async fn filter_hit_without_cache_entry_is_unknown() {
        let reg = registry();
        reg.claim("old@company.com").await;
        reg.taken.invalidate("old@company.com").await;
        assert_eq!(reg.lookup("old@company.com"), Lookup::Unknown);

        reg.confirm_taken("old@company.com").await;
        assert_eq!(reg.lookup("old@company.com"), Lookup::Taken);
    }
}
